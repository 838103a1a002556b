//! Protocol constants and default tuning values.
//!
//! Timeouts follow what long-running magnet resolvers settled on in practice:
//! peers get a short connect window and a generous transfer window, and
//! trackers get a short answer window because most of them are dead.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Azureus-style peer id prefix.
pub const CLIENT_PREFIX: &[u8; 8] = b"-MR0001-";

/// Client name advertised as `v` in the extension handshake.
pub const CLIENT_NAME: &str = "magnet-resolve/0.1";

/// Port reported to trackers. Nothing listens on it; resolution is outbound only.
pub const DEFAULT_PORT: u16 = 6881;

// ============================================================================
// Peer wire
// ============================================================================

/// Protocol string of the BitTorrent handshake.
pub const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";

/// pstrlen + pstr + reserved + info hash + peer id.
pub const HANDSHAKE_LEN: usize = 1 + 19 + 8 + 20 + 20;

/// Byte and mask of the extension protocol bit (BEP-10) in the reserved field.
pub const EXTENSION_BIT: (usize, u8) = (5, 0x10);

/// Message id of extended messages (BEP-10).
pub const EXTENDED_MESSAGE_ID: u8 = 20;

/// Extended sub-id of the extension handshake.
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

/// Sub-id we ask peers to use when sending us ut_metadata messages.
pub const LOCAL_METADATA_ID: u8 = 1;

/// Largest frame accepted from a peer. A metadata data frame is a 16 KiB piece
/// plus a small header, so anything near this size is already suspicious.
pub const MAX_FRAME_SIZE: usize = 256 * 1024;

/// Size of a metadata piece (BEP-9).
pub const METADATA_PIECE_SIZE: usize = 16384;

/// Largest `metadata_size` a peer may announce.
pub const MAX_METADATA_SIZE: usize = 8 * 1024 * 1024;

/// TCP connect window for a single peer.
pub const PEER_CONNECT_TIMEOUT: Duration = Duration::from_secs(7);

/// Window for the whole exchange once a peer socket is open.
pub const PEER_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Trackers
// ============================================================================

/// BEP-15 connect magic.
pub const UDP_PROTOCOL_ID: u64 = 0x41727101980;

pub const UDP_TRACKER_TIMEOUT: Duration = Duration::from_secs(12);

pub const HTTP_TRACKER_TIMEOUT: Duration = Duration::from_secs(7);

/// `left` reported in announces; nothing is ever downloaded.
pub const ANNOUNCE_LEFT: u64 = 16384;

pub const UDP_NUMWANT: i32 = 100;

pub const HTTP_NUMWANT: u32 = 200;

/// Public trackers appended when `use_extra_trackers` is enabled.
pub const DEFAULT_TRACKERS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://exodus.desync.com:6969/announce",
    "udp://tracker.openbittorrent.com:6969/announce",
    "http://tracker.opentrackr.org:1337/announce",
];

// ============================================================================
// Orchestration
// ============================================================================

/// Peer attempts allowed in flight for one resolution.
pub const MAX_CONCURRENT_PEERS: usize = 50;

/// Capacity of the candidate channel between peer sources and the resolver.
pub const CANDIDATE_CHANNEL_CAPACITY: usize = 64;
