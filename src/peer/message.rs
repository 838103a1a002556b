use super::error::PeerError;
use crate::constants::{EXTENDED_MESSAGE_ID, EXTENSION_BIT, HANDSHAKE_LEN, PROTOCOL};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The fixed 68-byte BitTorrent handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(reserved: [u8; 8], info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self {
            reserved,
            info_hash,
            peer_id,
        }
    }

    pub fn supports_extension_protocol(&self) -> bool {
        let (byte, mask) = EXTENSION_BIT;
        self.reserved[byte] & mask != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    /// Parses the first [`HANDSHAKE_LEN`] bytes of `data`.
    ///
    /// Only the protocol string is validated here; capability and info hash
    /// checks belong to the caller.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake);
        }

        if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
            return Err(PeerError::InvalidHandshake);
        }

        let mut data = &data[20..HANDSHAKE_LEN];
        let mut handshake = Self::new([0; 8], [0; 20], [0; 20]);
        data.copy_to_slice(&mut handshake.reserved);
        data.copy_to_slice(&mut handshake.info_hash);
        data.copy_to_slice(&mut handshake.peer_id);
        Ok(handshake)
    }
}

/// A post-handshake peer wire message.
///
/// Only extended messages (BEP-10) matter for metadata exchange; every other
/// message id is kept as [`Message::Other`] so the caller can skip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Extended { id: u8, payload: Bytes },
    Other { id: u8 },
}

impl Message {
    /// Encodes the message with its 4-byte big-endian length prefix.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Message::KeepAlive => {
                buf.put_u32(0);
            }
            Message::Extended { id, payload } => {
                buf.put_u32(2 + payload.len() as u32);
                buf.put_u8(EXTENDED_MESSAGE_ID);
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
            Message::Other { id } => {
                buf.put_u32(1);
                buf.put_u8(*id);
            }
        }

        buf.freeze()
    }

    /// Decodes a frame body: message id plus payload, length prefix already
    /// stripped. An empty body is a keep-alive.
    pub fn decode(mut body: Bytes) -> Result<Self, PeerError> {
        if body.is_empty() {
            return Ok(Message::KeepAlive);
        }

        let id = body.get_u8();
        if id != EXTENDED_MESSAGE_ID {
            return Ok(Message::Other { id });
        }

        if body.is_empty() {
            return Err(PeerError::InvalidMessage("extended message without id".into()));
        }

        let ext_id = body.get_u8();
        Ok(Message::Extended {
            id: ext_id,
            payload: body,
        })
    }
}
