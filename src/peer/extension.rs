use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::PeerError;
use crate::bencode::{decode, encode, Value};

/// The BEP-10 extension handshake (extended message sub-id 0).
///
/// `extensions` is the `m` dictionary: extension name to the sub-id the
/// sender wants to *receive* that extension's messages on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHandshake {
    pub extensions: BTreeMap<String, u8>,
    /// `v`: free-form client name and version.
    pub client: Option<String>,
    /// Size of the info dictionary, sent by peers that have it.
    pub metadata_size: Option<i64>,
}

impl ExtensionHandshake {
    pub fn with_extensions(extensions: &[(&str, u8)]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|&(name, id)| (name.to_string(), id))
                .collect(),
            ..Self::default()
        }
    }

    pub fn encode(&self) -> Result<Bytes, PeerError> {
        let m: BTreeMap<Bytes, Value> = self
            .extensions
            .iter()
            .map(|(name, &id)| (Bytes::copy_from_slice(name.as_bytes()), Value::from(u32::from(id))))
            .collect();

        let mut entries = vec![(&b"m"[..], Value::Dict(m))];
        if let Some(size) = self.metadata_size {
            entries.push((&b"metadata_size"[..], Value::Integer(size)));
        }
        if let Some(client) = &self.client {
            entries.push((&b"v"[..], Value::string(client)));
        }

        Ok(Bytes::from(encode(&Value::dict(entries))?))
    }

    /// Parses a handshake payload.
    ///
    /// Entries of `m` with id 0 mean "disabled" and are dropped, as are ids
    /// that do not fit a byte and names that are not UTF-8. A missing `m` is
    /// an empty extension set, not an error.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        let value = decode(data)?;
        if value.as_dict().is_none() {
            return Err(PeerError::InvalidMessage("extension handshake is not a dict".into()));
        }

        let extensions = value
            .get(b"m")
            .and_then(Value::as_dict)
            .into_iter()
            .flatten()
            .filter_map(|(name, id)| {
                let name = std::str::from_utf8(name).ok()?;
                let id = id.as_integer().and_then(|i| u8::try_from(i).ok())?;
                (id != 0).then(|| (name.to_string(), id))
            })
            .collect();

        Ok(Self {
            extensions,
            client: value.get(b"v").and_then(Value::as_str).map(String::from),
            metadata_size: value.get(b"metadata_size").and_then(Value::as_integer),
        })
    }

    pub fn get_extension_id(&self, name: &str) -> Option<u8> {
        self.extensions.get(name).copied()
    }
}
