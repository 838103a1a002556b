//! Metadata exchange extension (ut_metadata, BEP-9).
//!
//! A ut_metadata message is a bencoded header dictionary, optionally followed
//! by raw piece bytes. The header is located with
//! [`decode_prefix`](crate::bencode::decode_prefix), so the raw tail may
//! contain anything, including bytes that look like bencode terminators.

use bytes::Bytes;

use super::error::PeerError;
use crate::bencode::{decode_prefix, encode, Value};
use crate::constants::METADATA_PIECE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMessageType {
    Request = 0,
    Data = 1,
    Reject = 2,
}

impl MetadataMessageType {
    pub fn from_integer(i: i64) -> Option<Self> {
        match i {
            0 => Some(MetadataMessageType::Request),
            1 => Some(MetadataMessageType::Data),
            2 => Some(MetadataMessageType::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataMessage {
    pub msg_type: MetadataMessageType,
    pub piece: u32,
    /// Only meaningful on data messages.
    pub total_size: Option<u32>,
    /// Raw bytes following the header; empty unless this is a data message.
    pub data: Bytes,
}

impl MetadataMessage {
    pub fn request(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Request,
            piece,
            total_size: None,
            data: Bytes::new(),
        }
    }

    pub fn data(piece: u32, total_size: u32, data: Bytes) -> Self {
        Self {
            msg_type: MetadataMessageType::Data,
            piece,
            total_size: Some(total_size),
            data,
        }
    }

    pub fn reject(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Reject,
            piece,
            total_size: None,
            data: Bytes::new(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, PeerError> {
        let mut entries = vec![
            (&b"msg_type"[..], Value::Integer(self.msg_type as i64)),
            (&b"piece"[..], Value::from(self.piece)),
        ];
        if let Some(total_size) = self.total_size {
            entries.push((&b"total_size"[..], Value::from(total_size)));
        }

        let mut out = encode(&Value::dict(entries))?;
        out.extend_from_slice(&self.data);
        Ok(Bytes::from(out))
    }

    pub fn decode(payload: &Bytes) -> Result<Self, PeerError> {
        let (header, header_len) = decode_prefix(payload)?;

        let msg_type = header
            .get(b"msg_type")
            .and_then(Value::as_integer)
            .ok_or_else(|| PeerError::InvalidMessage("missing msg_type".into()))?;
        let msg_type = MetadataMessageType::from_integer(msg_type)
            .ok_or_else(|| PeerError::InvalidMessage(format!("unknown msg_type {}", msg_type)))?;

        let piece = header
            .get(b"piece")
            .and_then(Value::as_u32)
            .ok_or_else(|| PeerError::InvalidMessage("missing or invalid piece".into()))?;

        let total_size = header.get(b"total_size").and_then(Value::as_u32);

        let data = if msg_type == MetadataMessageType::Data {
            payload.slice(header_len..)
        } else {
            Bytes::new()
        };

        Ok(Self {
            msg_type,
            piece,
            total_size,
            data,
        })
    }
}

/// Number of pieces a metadata blob of `metadata_size` bytes is split into.
pub fn metadata_piece_count(metadata_size: usize) -> usize {
    metadata_size.div_ceil(METADATA_PIECE_SIZE)
}
