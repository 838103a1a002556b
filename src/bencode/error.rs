use thiserror::Error;

/// Errors produced while parsing bencode input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended in the middle of a value.
    #[error("truncated input")]
    Truncated,

    /// The input contains an invalid marker, digit or structure.
    #[error("malformed bencode: {0}")]
    Malformed(String),

    /// A complete value was decoded but bytes remain.
    #[error("trailing data after value")]
    TrailingData,
}

/// Errors produced while building or serializing bencode values.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("integer out of range: {0}")]
    IntegerOutOfRange(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
