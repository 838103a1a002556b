use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Result of one announce.
///
/// `AnnounceResponse::default()` is the zero value every failed announce
/// degrades to: no seeders, no leechers, no peers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceResponse {
    pub interval: u32,
    pub seeders: u32,
    pub leechers: u32,
    pub peers: Vec<SocketAddr>,
}

impl AnnounceResponse {
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    None,
    Started,
    Stopped,
    Completed,
}

impl TrackerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerEvent::None => "",
            TrackerEvent::Started => "started",
            TrackerEvent::Stopped => "stopped",
            TrackerEvent::Completed => "completed",
        }
    }

    pub fn as_udp_id(&self) -> u32 {
        match self {
            TrackerEvent::None => 0,
            TrackerEvent::Completed => 1,
            TrackerEvent::Started => 2,
            TrackerEvent::Stopped => 3,
        }
    }
}

/// A peer address in compact form: 4 or 16 address bytes then a big-endian port.
#[derive(Debug, Clone, Copy)]
pub struct CompactPeer {
    pub ip: IpAddr,
    pub port: u16,
}

impl CompactPeer {
    pub const V4_LEN: usize = 6;
    pub const V6_LEN: usize = 18;

    pub fn from_v4_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; Self::V4_LEN] = bytes.get(..Self::V4_LEN)?.try_into().ok()?;
        Some(Self {
            ip: IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])),
            port: u16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }

    pub fn from_v6_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; Self::V6_LEN] = bytes.get(..Self::V6_LEN)?.try_into().ok()?;
        let mut ip = [0u8; 16];
        ip.copy_from_slice(&bytes[..16]);
        Some(Self {
            ip: IpAddr::V6(Ipv6Addr::from(ip)),
            port: u16::from_be_bytes([bytes[16], bytes[17]]),
        })
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Parses a flat array of 6-byte IPv4 entries. A partial trailing entry and
/// port-0 entries are dropped.
pub fn parse_compact_peers(data: &[u8]) -> Vec<SocketAddr> {
    data.chunks_exact(CompactPeer::V4_LEN)
        .filter_map(CompactPeer::from_v4_bytes)
        .filter(|p| p.port != 0)
        .map(|p| p.to_socket_addr())
        .collect()
}

/// Parses a flat array of 18-byte IPv6 entries.
pub fn parse_compact_peers6(data: &[u8]) -> Vec<SocketAddr> {
    data.chunks_exact(CompactPeer::V6_LEN)
        .filter_map(CompactPeer::from_v6_bytes)
        .filter(|p| p.port != 0)
        .map(|p| p.to_socket_addr())
        .collect()
}
