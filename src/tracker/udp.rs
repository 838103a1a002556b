use std::net::SocketAddr;

use bytes::{Buf, BufMut, BytesMut};
use rand::Rng as _;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use super::error::TrackerError;
use super::response::{parse_compact_peers, parse_compact_peers6, AnnounceResponse, TrackerEvent};
use crate::constants::{ANNOUNCE_LEFT, UDP_NUMWANT, UDP_PROTOCOL_ID};
use crate::info_hash::InfoHash;
use crate::peer::PeerId;

const ACTION_CONNECT: u32 = 0;
const ACTION_ANNOUNCE: u32 = 1;
const ACTION_ERROR: u32 = 3;

const CONNECT_RESPONSE_LEN: usize = 16;
const ANNOUNCE_HEADER_LEN: usize = 20;
const MAX_DATAGRAM: usize = 2048;

/// A BEP-15 tracker session: one socket, one connection id.
///
/// Every wait is bounded by the caller's deadline. Datagrams carrying a
/// different transaction id are dropped and the wait continues, so a stray
/// late reply cannot derail the exchange.
pub struct UdpTracker {
    socket: UdpSocket,
    addr: SocketAddr,
    connection_id: u64,
}

impl UdpTracker {
    /// Resolves `host`, opens a socket and performs the connect exchange.
    pub async fn connect(host: &str, port: u16, deadline: Instant) -> Result<Self, TrackerError> {
        let addr = resolve(host, port, deadline).await?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;

        let transaction_id: u32 = rand::rng().random();

        let mut request = BytesMut::with_capacity(16);
        request.put_u64(UDP_PROTOCOL_ID);
        request.put_u32(ACTION_CONNECT);
        request.put_u32(transaction_id);
        socket.send(&request).await?;

        let response = receive_matching(
            &socket,
            ACTION_CONNECT,
            transaction_id,
            CONNECT_RESPONSE_LEN,
            deadline,
        )
        .await?;
        let connection_id = (&response[8..16]).get_u64();

        trace!(tracker = %addr, connection_id, "udp tracker connected");

        Ok(Self {
            socket,
            addr,
            connection_id,
        })
    }

    pub async fn announce(
        &self,
        info_hash: &InfoHash,
        peer_id: &PeerId,
        port: u16,
        event: TrackerEvent,
        deadline: Instant,
    ) -> Result<AnnounceResponse, TrackerError> {
        let transaction_id: u32 = rand::rng().random();
        let key: u32 = rand::rng().random();

        let mut request = BytesMut::with_capacity(98);
        request.put_u64(self.connection_id);
        request.put_u32(ACTION_ANNOUNCE);
        request.put_u32(transaction_id);
        request.put_slice(info_hash.as_bytes());
        request.put_slice(peer_id.as_bytes());
        request.put_u64(0); // downloaded
        request.put_u64(ANNOUNCE_LEFT);
        request.put_u64(0); // uploaded
        request.put_u32(event.as_udp_id());
        request.put_u32(0); // ip: use the sender address
        request.put_u32(key);
        request.put_i32(UDP_NUMWANT);
        request.put_u16(port);
        self.socket.send(&request).await?;

        let response = receive_matching(
            &self.socket,
            ACTION_ANNOUNCE,
            transaction_id,
            ANNOUNCE_HEADER_LEN,
            deadline,
        )
        .await?;

        let mut header = &response[8..ANNOUNCE_HEADER_LEN];
        let interval = header.get_u32();
        let leechers = header.get_u32();
        let seeders = header.get_u32();

        let body = &response[ANNOUNCE_HEADER_LEN..];
        let peers = if self.addr.is_ipv4() {
            parse_compact_peers(body)
        } else {
            parse_compact_peers6(body)
        };

        Ok(AnnounceResponse {
            interval,
            seeders,
            leechers,
            peers,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Announces to a UDP tracker, degrading every failure (DNS, timeout, short
/// or malformed datagram, tracker error) to the zero-value response.
pub async fn announce_udp(
    host: &str,
    port: u16,
    info_hash: &InfoHash,
    peer_id: &PeerId,
    listen_port: u16,
    deadline: Instant,
) -> AnnounceResponse {
    let result = async {
        let tracker = UdpTracker::connect(host, port, deadline).await?;
        tracker
            .announce(info_hash, peer_id, listen_port, TrackerEvent::None, deadline)
            .await
    }
    .await;

    match result {
        Ok(response) => response,
        Err(err) => {
            debug!(tracker = %format_args!("{}:{}", host, port), %err, "udp announce failed");
            AnnounceResponse::default()
        }
    }
}

async fn resolve(host: &str, port: u16, deadline: Instant) -> Result<SocketAddr, TrackerError> {
    let addrs: Vec<SocketAddr> = timeout_at(deadline, tokio::net::lookup_host((host, port)))
        .await
        .map_err(|_| TrackerError::Timeout)?
        .map_err(|_| TrackerError::Dns(host.to_string()))?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| TrackerError::Dns(host.to_string()))
}

async fn receive_matching(
    socket: &UdpSocket,
    action: u32,
    transaction_id: u32,
    min_len: usize,
    deadline: Instant,
) -> Result<Vec<u8>, TrackerError> {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let n = timeout_at(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| TrackerError::Timeout)??;
        let datagram = &buf[..n];

        if n < 8 {
            return Err(TrackerError::InvalidResponse(format!(
                "datagram of {} bytes",
                n
            )));
        }

        let mut head = &datagram[..8];
        let resp_action = head.get_u32();
        let resp_tid = head.get_u32();

        if resp_tid != transaction_id {
            trace!(expected = transaction_id, got = resp_tid, "discarding udp tracker datagram");
            continue;
        }

        if resp_action == ACTION_ERROR {
            let message = String::from_utf8_lossy(&datagram[8..]).into_owned();
            return Err(TrackerError::Failure(message));
        }

        if resp_action != action {
            return Err(TrackerError::InvalidResponse(format!(
                "expected action {}, got {}",
                action, resp_action
            )));
        }

        if n < min_len {
            return Err(TrackerError::InvalidResponse("response too short".into()));
        }

        return Ok(datagram.to_vec());
    }
}

/// Splits `udp://host:port[/path]` into host and port.
pub(crate) fn parse_udp_url(url: &str) -> Result<(String, u16), TrackerError> {
    let rest = url
        .strip_prefix("udp://")
        .ok_or_else(|| TrackerError::UnsupportedProtocol(url.to_string()))?;

    let authority = rest.split(|c| c == '/' || c == '?').next().unwrap_or(rest);
    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| TrackerError::InvalidUrl(url.to_string()))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port: u16 = port
        .parse()
        .map_err(|_| TrackerError::InvalidUrl(url.to_string()))?;

    if host.is_empty() || port == 0 {
        return Err(TrackerError::InvalidUrl(url.to_string()));
    }

    Ok((host.to_string(), port))
}
