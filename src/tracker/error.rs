use thiserror::Error;

/// Why a single announce failed.
///
/// These never leave the tracker module through the degrading entry points
/// ([`announce_udp`](super::announce_udp), [`announce_http`](super::announce_http),
/// [`TrackerClient::announce`](super::TrackerClient::announce)); they only
/// show up in logs.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {0}")]
    HttpStatus(u16),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::DecodeError),

    #[error("tracker returned error: {0}")]
    Failure(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("could not resolve {0}")]
    Dns(String),

    #[error("timeout")]
    Timeout,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
}
