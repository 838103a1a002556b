use thiserror::Error;

use crate::bencode::{DecodeError, EncodeError};

/// Why one peer attempt failed.
///
/// A `PeerError` only ever ends the attempt against that peer; the resolver
/// logs it and moves on to other candidates.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Connect refused, unreachable or timed out.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    /// The attempt ran past its deadline.
    #[error("timeout")]
    Timeout,

    /// The first 20 bytes were not `\x13BitTorrent protocol`.
    #[error("invalid handshake")]
    InvalidHandshake,

    /// The handshake lacks the extension protocol bit.
    #[error("peer does not support the extension protocol")]
    ExtensionUnsupported,

    #[error("info hash mismatch")]
    InfohashMismatch,

    /// The extension handshake does not list `ut_metadata`.
    #[error("peer does not support metadata exchange")]
    MetadataExchangeUnsupported,

    #[error("peer rejected metadata piece {piece}")]
    PeerRejectedRequest { piece: u32 },

    #[error("metadata does not hash to the info hash")]
    IntegrityMismatch,

    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("bencode error: {0}")]
    Bencode(#[from] DecodeError),

    #[error("bencode encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Coarse classification of [`PeerError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network trouble; says nothing about the peer's honesty.
    Transport,
    /// The peer broke or does not speak the protocol we need.
    Protocol,
    /// The peer served metadata that does not match the info hash.
    Integrity,
}

impl PeerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PeerError::Unreachable(_)
            | PeerError::Io(_)
            | PeerError::ConnectionClosed
            | PeerError::Timeout => FailureKind::Transport,
            PeerError::IntegrityMismatch => FailureKind::Integrity,
            _ => FailureKind::Protocol,
        }
    }
}
