//! Resolution orchestrator.
//!
//! Fans one infohash out to every tracker and the optional external peer
//! source, then races metadata fetches against the peers they return. The
//! first verified info dictionary wins and everything else is aborted.

mod error;

pub use crate::config::ResolverConfig;
pub use error::ResolveError;

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::constants::CANDIDATE_CHANNEL_CAPACITY;
use crate::info_hash::InfoHash;
use crate::peer::{MetadataClient, PeerError};
use crate::tracker::TrackerClient;

/// Turns infohashes into verified info dictionaries.
///
/// A `Resolver` holds only immutable configuration and shared clients, so one
/// instance can serve any number of concurrent resolutions.
///
/// ```no_run
/// use std::time::Duration;
/// use magnet_resolve::{InfoHash, Resolver, ResolverConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = Resolver::new(ResolverConfig::default())?;
/// let info_hash = InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a")?;
/// let trackers = vec!["udp://tracker.opentrackr.org:1337/announce".to_string()];
///
/// let info = resolver
///     .resolve(info_hash, &trackers, None, Duration::from_secs(60))
///     .await?;
/// println!("{} bytes of metadata", info.len());
/// # Ok(())
/// # }
/// ```
pub struct Resolver {
    config: Arc<ResolverConfig>,
    trackers: TrackerClient,
    peers: MetadataClient,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        config.validate().map_err(ResolveError::InvalidConfig)?;
        let trackers = TrackerClient::from_config(&config)?;
        let config = Arc::new(config);
        let peers = MetadataClient::new(config.clone());

        Ok(Self {
            config,
            trackers,
            peers,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `info_hash`, giving up after `overall_deadline`.
    ///
    /// `dht_peers` is an externally fed peer source; its addresses join the
    /// same candidate pool as tracker results.
    pub async fn resolve(
        &self,
        info_hash: InfoHash,
        trackers: &[String],
        dht_peers: Option<mpsc::Receiver<SocketAddr>>,
        overall_deadline: Duration,
    ) -> Result<Bytes, ResolveError> {
        self.resolve_until(
            info_hash,
            trackers,
            dht_peers,
            overall_deadline,
            std::future::pending(),
        )
        .await
    }

    /// Like [`resolve`](Self::resolve), but gives up with
    /// [`ResolveError::Cancelled`] as soon as `cancel` completes.
    ///
    /// Every tracker query and peer attempt is a task owned by this call;
    /// they are all aborted when it returns, whatever the outcome.
    pub async fn resolve_until<C>(
        &self,
        info_hash: InfoHash,
        trackers: &[String],
        dht_peers: Option<mpsc::Receiver<SocketAddr>>,
        overall_deadline: Duration,
        cancel: C,
    ) -> Result<Bytes, ResolveError>
    where
        C: Future<Output = ()>,
    {
        let deadline = Instant::now() + overall_deadline;
        let tracker_urls = self.tracker_list(trackers);

        info!(
            info_hash = %info_hash,
            trackers = tracker_urls.len(),
            dht = dht_peers.is_some(),
            "resolving metadata"
        );

        let (peer_tx, mut peer_rx) = mpsc::channel::<Vec<SocketAddr>>(CANDIDATE_CHANNEL_CAPACITY);
        let mut sources = JoinSet::new();

        for url in tracker_urls {
            let client = self.trackers.clone();
            let tx = peer_tx.clone();
            sources.spawn(async move {
                let response = client.announce(&url, &info_hash, deadline).await;
                if !response.peers.is_empty() {
                    let _ = tx.send(response.peers).await;
                }
            });
        }

        if let Some(mut dht) = dht_peers {
            let tx = peer_tx.clone();
            sources.spawn(async move {
                while let Some(addr) = dht.recv().await {
                    if tx.send(vec![addr]).await.is_err() {
                        break;
                    }
                }
            });
        }

        // The channel closes once every source task has finished.
        drop(peer_tx);

        let mut candidates = Candidates::default();
        let mut attempts: JoinSet<(SocketAddr, Result<Bytes, PeerError>)> = JoinSet::new();
        let mut sources_open = true;
        let mut tried = 0usize;

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        tokio::pin!(cancel);

        loop {
            while attempts.len() < self.config.max_concurrent_peers {
                let Some(addr) = candidates.pop() else {
                    break;
                };
                let client = self.peers.clone();
                attempts.spawn(async move { (addr, client.fetch(addr, info_hash).await) });
                tried += 1;
            }

            if !sources_open && attempts.is_empty() && candidates.is_empty() {
                debug!(info_hash = %info_hash, tried, "all sources exhausted");
                return Err(ResolveError::NotFound);
            }

            tokio::select! {
                biased;

                _ = &mut cancel => {
                    debug!(info_hash = %info_hash, tried, "resolution cancelled");
                    return Err(ResolveError::Cancelled);
                }
                _ = &mut sleep => {
                    debug!(info_hash = %info_hash, tried, "resolution deadline elapsed");
                    return Err(ResolveError::NotFound);
                }
                Some(joined) = attempts.join_next(), if !attempts.is_empty() => {
                    match joined {
                        Ok((peer, Ok(metadata))) => {
                            info!(
                                info_hash = %info_hash,
                                peer = %peer,
                                bytes = metadata.len(),
                                tried,
                                "metadata resolved"
                            );
                            return Ok(metadata);
                        }
                        Ok((peer, Err(err))) => {
                            debug!(peer = %peer, kind = ?err.kind(), err = %err, "peer attempt failed");
                        }
                        Err(err) => {
                            debug!(err = %err, "peer task failed");
                        }
                    }
                }
                batch = peer_rx.recv(), if sources_open => {
                    match batch {
                        Some(peers) => {
                            let added = candidates.extend(peers);
                            debug!(info_hash = %info_hash, added, pending = candidates.len(), "new candidates");
                        }
                        None => sources_open = false,
                    }
                }
            }
        }
    }

    /// Caller trackers, then the configured extras, without duplicates.
    fn tracker_list(&self, trackers: &[String]) -> Vec<String> {
        let extras = if self.config.use_extra_trackers {
            self.config.extra_trackers.as_slice()
        } else {
            &[]
        };

        let mut seen = HashSet::new();
        trackers
            .iter()
            .chain(extras)
            .map(|url| url.trim())
            .filter(|url| !url.is_empty() && seen.insert(url.to_string()))
            .map(String::from)
            .collect()
    }
}

/// Peers not yet attempted, in arrival order. An address is only ever
/// queued once per resolution.
#[derive(Default)]
struct Candidates {
    seen: HashSet<SocketAddr>,
    pending: VecDeque<SocketAddr>,
}

impl Candidates {
    fn extend(&mut self, peers: Vec<SocketAddr>) -> usize {
        let mut added = 0;
        for peer in peers {
            if self.seen.insert(peer) {
                self.pending.push_back(peer);
                added += 1;
            }
        }
        added
    }

    fn pop(&mut self) -> Option<SocketAddr> {
        self.pending.pop_front()
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
