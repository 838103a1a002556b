//! magnet-resolve - turn a BitTorrent infohash into its verified info dictionary
//!
//! Given the 20-byte infohash of a magnet link, this crate finds peers through
//! trackers (and any external peer source the caller wires in, such as a DHT),
//! then fetches the info dictionary from them with the metadata exchange
//! extension. Only metadata whose SHA-1 equals the infohash is ever returned.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`tracker`] - BEP-3/15/23 HTTP and UDP tracker announces
//! - [`peer`] - BEP-3/9/10 handshake, extension protocol and ut_metadata
//! - [`resolver`] - Orchestration of trackers and peer attempts under one deadline
//!
//! ```no_run
//! use std::time::Duration;
//! use magnet_resolve::{InfoHash, Resolver, ResolverConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::new(ResolverConfig {
//!     use_extra_trackers: true,
//!     ..ResolverConfig::default()
//! })?;
//!
//! let info_hash = InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a")?;
//! let info = resolver.resolve(info_hash, &[], None, Duration::from_secs(60)).await?;
//! let dict = magnet_resolve::decode(&info)?;
//! println!("name: {:?}", dict.get(b"name").and_then(|v| v.as_str()));
//! # Ok(())
//! # }
//! ```

pub mod bencode;
pub mod config;
pub mod constants;
pub mod info_hash;
pub mod peer;
pub mod resolver;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use bencode::{decode, encode, DecodeError, EncodeError, Value};
pub use config::ResolverConfig;
pub use info_hash::{InfoHash, InfoHashError};
pub use peer::{FailureKind, MetadataClient, MetadataSession, PeerError, PeerId};
pub use resolver::{ResolveError, Resolver};
pub use tracker::{AnnounceResponse, TrackerClient, TrackerError};
