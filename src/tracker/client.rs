use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::TrackerError;
use super::http::announce_http;
use super::response::AnnounceResponse;
use super::udp::{announce_udp, parse_udp_url};
use crate::config::ResolverConfig;
use crate::constants::CLIENT_NAME;
use crate::info_hash::InfoHash;
use crate::peer::PeerId;

/// Announces to trackers of any supported scheme.
///
/// Cheap to clone; clones share the HTTP connection pool. Every call returns
/// an [`AnnounceResponse`], never an error: a dead, slow or misbehaving tracker
/// simply contributes no peers.
#[derive(Clone)]
pub struct TrackerClient {
    http: Client,
    peer_id: PeerId,
    listen_port: u16,
    udp_timeout: Duration,
}

impl TrackerClient {
    pub fn new(
        peer_id: PeerId,
        listen_port: u16,
        udp_timeout: Duration,
        http_timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(http_timeout)
            .user_agent(CLIENT_NAME)
            .build()?;

        Ok(Self {
            http,
            peer_id,
            listen_port,
            udp_timeout,
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self, TrackerError> {
        Self::new(
            config.peer_id,
            config.listen_port,
            config.udp_tracker_timeout,
            config.http_tracker_timeout,
        )
    }

    pub async fn announce(&self, url: &str, info_hash: &InfoHash, deadline: Instant) -> AnnounceResponse {
        let response = if url.starts_with("udp://") {
            match parse_udp_url(url) {
                Ok((host, port)) => {
                    let deadline = deadline.min(Instant::now() + self.udp_timeout);
                    announce_udp(&host, port, info_hash, &self.peer_id, self.listen_port, deadline)
                        .await
                }
                Err(err) => {
                    warn!(tracker = url, %err, "skipping tracker");
                    AnnounceResponse::default()
                }
            }
        } else if url.starts_with("http://") || url.starts_with("https://") {
            announce_http(
                &self.http,
                url,
                info_hash,
                &self.peer_id,
                self.listen_port,
                deadline,
            )
            .await
        } else {
            warn!(tracker = url, "unsupported tracker scheme");
            AnnounceResponse::default()
        };

        debug!(
            tracker = url,
            peers = response.peers.len(),
            seeders = response.seeders,
            leechers = response.leechers,
            "announce finished"
        );
        response
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }
}
