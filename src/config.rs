use std::time::Duration;

use crate::constants::{
    CLIENT_NAME, DEFAULT_PORT, DEFAULT_TRACKERS, EXTENSION_BIT, HTTP_TRACKER_TIMEOUT,
    LOCAL_METADATA_ID, MAX_CONCURRENT_PEERS, MAX_FRAME_SIZE, PEER_CONNECT_TIMEOUT,
    PEER_SESSION_TIMEOUT, UDP_TRACKER_TIMEOUT,
};
use crate::peer::PeerId;

/// Settings for one [`Resolver`](crate::Resolver).
///
/// Everything that would otherwise be process-wide state (our peer id, the
/// reserved handshake bits, the ut_metadata id we advertise) lives here and is
/// handed to the tracker and peer clients explicitly.
///
/// ```
/// use std::time::Duration;
/// use magnet_resolve::ResolverConfig;
///
/// let config = ResolverConfig {
///     max_concurrent_peers: 20,
///     peer_timeout: Duration::from_secs(15),
///     ..ResolverConfig::default()
/// };
/// assert!(config.supports_extension_protocol());
/// ```
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub peer_id: PeerId,
    /// Port reported to trackers.
    pub listen_port: u16,
    /// Reserved bytes of our handshake; must carry the extension bit.
    pub reserved: [u8; 8],
    /// Extended sub-id peers should use for ut_metadata messages to us.
    pub local_metadata_id: u8,
    /// `v` in the extension handshake; `None` omits it.
    pub client_name: Option<String>,
    pub connect_timeout: Duration,
    /// Bound on handshake plus full metadata transfer, per peer.
    pub peer_timeout: Duration,
    pub udp_tracker_timeout: Duration,
    pub http_tracker_timeout: Duration,
    pub max_frame_size: usize,
    pub max_concurrent_peers: usize,
    /// Append [`extra_trackers`](Self::extra_trackers) to every resolution.
    pub use_extra_trackers: bool,
    pub extra_trackers: Vec<String>,
}

impl ResolverConfig {
    pub fn supports_extension_protocol(&self) -> bool {
        let (byte, mask) = EXTENSION_BIT;
        self.reserved[byte] & mask != 0
    }

    /// Rejects settings under which no metadata exchange can succeed.
    ///
    /// Extended message id 0 is the extension handshake itself and, in an
    /// `m` dictionary, means "disabled", so it cannot name ut_metadata.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.supports_extension_protocol() {
            return Err("reserved bytes lack the extension protocol bit");
        }
        if self.local_metadata_id == 0 {
            return Err("local_metadata_id must be non-zero");
        }
        if self.max_concurrent_peers == 0 {
            return Err("max_concurrent_peers must be non-zero");
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let mut reserved = [0u8; 8];
        let (byte, mask) = EXTENSION_BIT;
        reserved[byte] |= mask;

        Self {
            peer_id: PeerId::generate(),
            listen_port: DEFAULT_PORT,
            reserved,
            local_metadata_id: LOCAL_METADATA_ID,
            client_name: Some(CLIENT_NAME.to_string()),
            connect_timeout: PEER_CONNECT_TIMEOUT,
            peer_timeout: PEER_SESSION_TIMEOUT,
            udp_tracker_timeout: UDP_TRACKER_TIMEOUT,
            http_tracker_timeout: HTTP_TRACKER_TIMEOUT,
            max_frame_size: MAX_FRAME_SIZE,
            max_concurrent_peers: MAX_CONCURRENT_PEERS,
            use_extra_trackers: false,
            extra_trackers: DEFAULT_TRACKERS.iter().map(|t| t.to_string()).collect(),
        }
    }
}
