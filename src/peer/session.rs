use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::error::PeerError;
use super::extension::ExtensionHandshake;
use super::message::{Handshake, Message};
use super::metadata::{metadata_piece_count, MetadataMessage, MetadataMessageType};
use super::peer_id::PeerId;
use crate::config::ResolverConfig;
use crate::constants::{
    EXTENSION_HANDSHAKE_ID, HANDSHAKE_LEN, MAX_METADATA_SIZE, METADATA_PIECE_SIZE,
};
use crate::info_hash::InfoHash;

/// Where a [`MetadataSession`] is in the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing sent yet.
    Connecting,
    /// Our handshake is out; waiting for the peer's.
    HandshakeSent,
    /// Handshakes exchanged and our extension handshake sent; waiting for the peer's.
    HandshakeWaiting,
    /// The peer's extension handshake was accepted.
    ExtensionNegotiated,
    /// A metadata piece request is outstanding.
    RequestingPieces,
    /// All pieces are in; hashing.
    Verifying,
    /// Metadata verified and emitted.
    Done,
    /// The session hit an error and dropped its state.
    Failed,
}

/// Output of [`MetadataSession::on_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Bytes to write to the peer.
    Send(Bytes),
    /// The verified info dictionary.
    Complete(Bytes),
}

/// Sans-IO state machine fetching metadata from a single peer.
///
/// The session never touches a socket. The caller writes the bytes returned by
/// [`start`](Self::start), then feeds everything it reads into
/// [`on_bytes`](Self::on_bytes), drops the consumed prefix from its buffer
/// and writes out every [`SessionEvent::Send`]. Pieces are requested one at a
/// time: piece `n + 1` is only requested once piece `n` has arrived.
///
/// The first error moves the session to [`SessionState::Failed`] and discards
/// every buffered piece, so a failed session never exposes partial metadata.
pub struct MetadataSession {
    info_hash: InfoHash,
    peer_id: PeerId,
    reserved: [u8; 8],
    local_metadata_id: u8,
    client_name: Option<String>,
    max_frame_size: usize,

    state: SessionState,
    remote_peer_id: Option<[u8; 20]>,
    remote_metadata_id: Option<u8>,
    expected_size: Option<u32>,
    /// Index of the single piece request in flight.
    outstanding: Option<u32>,
    pieces: BTreeMap<u32, Bytes>,
    received: usize,
}

impl MetadataSession {
    pub fn new(info_hash: InfoHash, config: &ResolverConfig) -> Self {
        Self {
            info_hash,
            peer_id: config.peer_id,
            reserved: config.reserved,
            local_metadata_id: config.local_metadata_id,
            client_name: config.client_name.clone(),
            max_frame_size: config.max_frame_size,
            state: SessionState::Connecting,
            remote_peer_id: None,
            remote_metadata_id: None,
            expected_size: None,
            outstanding: None,
            pieces: BTreeMap::new(),
            received: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn expected_size(&self) -> Option<u32> {
        self.expected_size
    }

    pub fn remote_metadata_id(&self) -> Option<u8> {
        self.remote_metadata_id
    }

    pub fn remote_peer_id(&self) -> Option<&[u8; 20]> {
        self.remote_peer_id.as_ref()
    }

    /// Returns our handshake and starts waiting for the peer's.
    pub fn start(&mut self) -> Bytes {
        self.state = SessionState::HandshakeSent;
        Handshake::new(self.reserved, self.info_hash.0, self.peer_id.0).encode()
    }

    /// Consumes every complete handshake or frame at the front of `buf`.
    ///
    /// Returns how many bytes were consumed and what the caller must do. An
    /// incomplete trailing frame is left unconsumed. Bytes arriving after
    /// [`SessionState::Done`] are ignored.
    pub fn on_bytes(&mut self, buf: &[u8]) -> Result<(usize, Vec<SessionEvent>), PeerError> {
        let mut consumed = 0;
        let mut events = Vec::new();

        match self.process(buf, &mut consumed, &mut events) {
            Ok(()) => Ok((consumed, events)),
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    fn process(
        &mut self,
        buf: &[u8],
        consumed: &mut usize,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), PeerError> {
        loop {
            let rest = &buf[*consumed..];

            match self.state {
                SessionState::Done => return Ok(()),
                SessionState::Failed => {
                    return Err(PeerError::InvalidMessage("session already failed".into()))
                }
                SessionState::Connecting => {
                    return Err(PeerError::InvalidMessage("session not started".into()))
                }
                SessionState::HandshakeSent => {
                    if rest.len() < HANDSHAKE_LEN {
                        return Ok(());
                    }
                    let handshake = Handshake::decode(&rest[..HANDSHAKE_LEN])?;
                    *consumed += HANDSHAKE_LEN;
                    self.on_handshake(handshake, events)?;
                }
                _ => {
                    if rest.len() < 4 {
                        return Ok(());
                    }
                    let length = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                    if length > self.max_frame_size {
                        return Err(PeerError::FrameTooLarge(length));
                    }
                    if rest.len() < 4 + length {
                        return Ok(());
                    }
                    let body = Bytes::copy_from_slice(&rest[4..4 + length]);
                    *consumed += 4 + length;
                    self.on_message(Message::decode(body)?, events)?;
                }
            }
        }
    }

    fn on_handshake(
        &mut self,
        handshake: Handshake,
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), PeerError> {
        if !handshake.supports_extension_protocol() {
            return Err(PeerError::ExtensionUnsupported);
        }
        if handshake.info_hash != self.info_hash.0 {
            return Err(PeerError::InfohashMismatch);
        }
        self.remote_peer_id = Some(handshake.peer_id);

        let mut ours = ExtensionHandshake::with_extensions(&[("ut_metadata", self.local_metadata_id)]);
        ours.client = self.client_name.clone();
        events.push(SessionEvent::Send(
            Message::Extended {
                id: EXTENSION_HANDSHAKE_ID,
                payload: ours.encode()?,
            }
            .encode(),
        ));

        self.state = SessionState::HandshakeWaiting;
        Ok(())
    }

    fn on_message(&mut self, message: Message, events: &mut Vec<SessionEvent>) -> Result<(), PeerError> {
        match message {
            Message::Extended { id, payload } if id == EXTENSION_HANDSHAKE_ID => {
                if self.state == SessionState::HandshakeWaiting {
                    self.on_extension_handshake(&payload, events)
                } else {
                    trace!("ignoring repeated extension handshake");
                    Ok(())
                }
            }
            Message::Extended { id, payload } if id == self.local_metadata_id => {
                self.on_metadata(&payload, events)
            }
            Message::Extended { id, .. } => {
                trace!(id, "ignoring extended message");
                Ok(())
            }
            Message::KeepAlive | Message::Other { .. } => Ok(()),
        }
    }

    fn on_extension_handshake(
        &mut self,
        payload: &[u8],
        events: &mut Vec<SessionEvent>,
    ) -> Result<(), PeerError> {
        let theirs = ExtensionHandshake::decode(payload)?;

        let remote_id = theirs
            .get_extension_id("ut_metadata")
            .ok_or(PeerError::MetadataExchangeUnsupported)?;

        if let Some(size) = theirs.metadata_size {
            self.expected_size = Some(validate_size(size)?);
        }
        self.remote_metadata_id = Some(remote_id);
        self.state = SessionState::ExtensionNegotiated;

        trace!(
            client = theirs.client.as_deref().unwrap_or("?"),
            metadata_size = ?self.expected_size,
            pieces = self.expected_size.map(|s| metadata_piece_count(s as usize)),
            "extension handshake accepted"
        );

        self.request_piece(0, events)
    }

    fn on_metadata(&mut self, payload: &Bytes, events: &mut Vec<SessionEvent>) -> Result<(), PeerError> {
        let message = MetadataMessage::decode(payload)?;

        match message.msg_type {
            // We never advertise metadata_size, so requests to us are ignored.
            MetadataMessageType::Request => Ok(()),
            MetadataMessageType::Reject => self.on_reject(message.piece, events),
            MetadataMessageType::Data => {
                let piece = message.piece;
                if self.state != SessionState::RequestingPieces || self.outstanding != Some(piece) {
                    return Err(PeerError::InvalidMessage(format!("unrequested metadata piece {}", piece)));
                }
                if self.expected_size.is_none() {
                    if let Some(total) = message.total_size {
                        self.expected_size = Some(validate_size(i64::from(total))?);
                    }
                }

                let piece_len = message.data.len();
                match self.expected_size {
                    Some(total) => {
                        let expected = expected_piece_len(total, piece)?;
                        if piece_len != expected {
                            return Err(PeerError::InvalidMessage(format!(
                                "piece {} has {} bytes, expected {}",
                                piece, piece_len, expected
                            )));
                        }
                    }
                    None if piece_len == 0 || piece_len > METADATA_PIECE_SIZE => {
                        return Err(PeerError::InvalidMessage(format!(
                            "piece {} has {} bytes",
                            piece, piece_len
                        )));
                    }
                    None => {}
                }

                self.outstanding = None;
                self.pieces.insert(piece, message.data);
                self.received += piece_len;

                if self.received > MAX_METADATA_SIZE {
                    return Err(PeerError::InvalidMessage("metadata exceeds size limit".into()));
                }

                let finished = match self.expected_size {
                    Some(total) => self.received >= total as usize,
                    None => piece_len < METADATA_PIECE_SIZE,
                };

                if finished {
                    self.verify(events)
                } else {
                    self.request_piece(piece + 1, events)
                }
            }
        }
    }

    /// Without a known size, a blob that is an exact multiple of the piece
    /// size can only end with the peer rejecting the piece past its end.
    /// Such a reject completes the transfer; any other reject fails it.
    fn on_reject(&mut self, piece: u32, events: &mut Vec<SessionEvent>) -> Result<(), PeerError> {
        let past_end = self.expected_size.is_none()
            && self.outstanding == Some(piece)
            && piece > 0
            && self.received == piece as usize * METADATA_PIECE_SIZE;

        if past_end {
            trace!(piece, "reject past the last full piece, verifying");
            self.outstanding = None;
            self.verify(events)
        } else {
            Err(PeerError::PeerRejectedRequest { piece })
        }
    }

    fn request_piece(&mut self, piece: u32, events: &mut Vec<SessionEvent>) -> Result<(), PeerError> {
        let id = self
            .remote_metadata_id
            .ok_or(PeerError::MetadataExchangeUnsupported)?;

        events.push(SessionEvent::Send(
            Message::Extended {
                id,
                payload: MetadataMessage::request(piece).encode()?,
            }
            .encode(),
        ));
        self.outstanding = Some(piece);
        self.state = SessionState::RequestingPieces;
        Ok(())
    }

    fn verify(&mut self, events: &mut Vec<SessionEvent>) -> Result<(), PeerError> {
        self.state = SessionState::Verifying;

        let mut metadata = BytesMut::with_capacity(self.received);
        for piece in std::mem::take(&mut self.pieces).into_values() {
            metadata.extend_from_slice(&piece);
        }
        self.received = 0;

        if InfoHash::digest(&metadata) != self.info_hash {
            return Err(PeerError::IntegrityMismatch);
        }

        events.push(SessionEvent::Complete(metadata.freeze()));
        self.state = SessionState::Done;
        Ok(())
    }

    fn fail(&mut self) {
        self.state = SessionState::Failed;
        self.outstanding = None;
        self.pieces.clear();
        self.received = 0;
    }
}

/// Length piece `piece` must have in a blob of `total` bytes.
fn expected_piece_len(total: u32, piece: u32) -> Result<usize, PeerError> {
    let total = total as usize;
    if piece as usize >= metadata_piece_count(total) {
        return Err(PeerError::InvalidMessage(format!(
            "piece {} beyond {} byte metadata",
            piece, total
        )));
    }
    let start = piece as usize * METADATA_PIECE_SIZE;
    Ok((total - start).min(METADATA_PIECE_SIZE))
}

fn validate_size(size: i64) -> Result<u32, PeerError> {
    match u32::try_from(size) {
        Ok(size) if size > 0 && size as usize <= MAX_METADATA_SIZE => Ok(size),
        _ => Err(PeerError::InvalidMessage(format!("invalid metadata_size {}", size))),
    }
}
