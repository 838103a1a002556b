use thiserror::Error;

use crate::tracker::TrackerError;

/// The only failures a resolution reports to its caller.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Every tracker, every peer and the deadline were exhausted.
    #[error("metadata not found")]
    NotFound,

    /// The caller's cancellation fired first.
    #[error("resolution cancelled")]
    Cancelled,

    /// The configuration cannot drive a metadata exchange.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The shared HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] TrackerError),
}
