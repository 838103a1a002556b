use std::fmt;

use sha1::{Digest, Sha1};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InfoHashError {
    #[error("info hash must be 20 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// The 20-byte SHA-1 identifier of a torrent's info dictionary.
///
/// Besides naming the swarm in tracker and handshake messages, it is the
/// integrity oracle for fetched metadata: the SHA-1 of the reassembled
/// info dictionary must equal it.
///
/// ```
/// use magnet_resolve::InfoHash;
///
/// let hash = InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a").unwrap();
/// assert_eq!(hash.to_hex(), "c12fe1c06bba254a9dc9f519b335aa7c1367a88a");
/// assert!(InfoHash::from_hex("abcd").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InfoHashError> {
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| InfoHashError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self, InfoHashError> {
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// SHA-1 of `data`; used to check metadata against the requested hash.
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
