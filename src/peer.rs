//! Peer wire protocol for metadata exchange (BEP-3, BEP-9, BEP-10)
//!
//! [`MetadataSession`] is the protocol itself as a pure state machine over
//! byte buffers; [`MetadataClient`] runs it over a TCP connection.

mod client;
mod error;
mod extension;
mod message;
mod metadata;
mod peer_id;
mod session;

pub use client::MetadataClient;
pub use error::{FailureKind, PeerError};
pub use extension::ExtensionHandshake;
pub use message::{Handshake, Message};
pub use metadata::{metadata_piece_count, MetadataMessage, MetadataMessageType};
pub use peer_id::PeerId;
pub use session::{MetadataSession, SessionEvent, SessionState};
