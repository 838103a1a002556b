use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::trace;

use super::error::PeerError;
use super::session::{MetadataSession, SessionEvent};
use crate::config::ResolverConfig;
use crate::info_hash::InfoHash;

const READ_BUFFER_CAPACITY: usize = 32 * 1024;

/// Fetches metadata from one peer over TCP by driving a [`MetadataSession`].
///
/// The connect step is bounded by `connect_timeout`; everything after it by
/// `peer_timeout`. Dropping the future returned by [`fetch`](Self::fetch)
/// closes the socket and discards the session.
///
/// ```no_run
/// use std::sync::Arc;
/// use magnet_resolve::{InfoHash, ResolverConfig};
/// use magnet_resolve::peer::MetadataClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MetadataClient::new(Arc::new(ResolverConfig::default()));
/// let info_hash = InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a")?;
/// let info = client.fetch("192.0.2.7:6881".parse()?, info_hash).await?;
/// println!("{} bytes of metadata", info.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MetadataClient {
    config: Arc<ResolverConfig>,
}

impl MetadataClient {
    pub fn new(config: Arc<ResolverConfig>) -> Self {
        Self { config }
    }

    pub async fn fetch(&self, addr: SocketAddr, info_hash: InfoHash) -> Result<Bytes, PeerError> {
        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(PeerError::Unreachable(err.to_string())),
            Err(_) => return Err(PeerError::Unreachable("connect timed out".into())),
        };
        trace!(peer = %addr, "connected");

        let deadline = Instant::now() + self.config.peer_timeout;
        timeout_at(deadline, self.exchange(stream, addr, info_hash))
            .await
            .map_err(|_| PeerError::Timeout)?
    }

    async fn exchange(
        &self,
        mut stream: TcpStream,
        addr: SocketAddr,
        info_hash: InfoHash,
    ) -> Result<Bytes, PeerError> {
        let mut session = MetadataSession::new(info_hash, &self.config);
        stream.write_all(&session.start()).await?;

        let mut read_buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
        loop {
            let n = stream.read_buf(&mut read_buf).await?;
            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }

            let (consumed, events) = session.on_bytes(&read_buf)?;
            read_buf.advance(consumed);

            for event in events {
                match event {
                    SessionEvent::Send(data) => stream.write_all(&data).await?,
                    SessionEvent::Complete(metadata) => {
                        trace!(peer = %addr, bytes = metadata.len(), "metadata verified");
                        return Ok(metadata);
                    }
                }
            }
            trace!(peer = %addr, state = ?session.state(), "waiting for peer");
        }
    }
}
