//! Tracker protocols (BEP-3, BEP-15, BEP-23)
//!
//! HTTP and UDP announces used to discover peers for an info hash. The
//! strict [`UdpTracker`] and [`HttpTracker`] report every failure; the
//! [`announce_udp`], [`announce_http`] and [`TrackerClient::announce`] entry
//! points absorb them and return an empty [`AnnounceResponse`] instead.

mod client;
mod error;
mod http;
mod response;
mod udp;

pub use client::TrackerClient;
pub use error::TrackerError;
pub use http::{announce_http, HttpTracker};
pub use response::{parse_compact_peers, parse_compact_peers6, AnnounceResponse, CompactPeer, TrackerEvent};
pub use udp::{announce_udp, UdpTracker};

#[cfg(test)]
mod tests;
