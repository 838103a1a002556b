use std::net::{IpAddr, SocketAddr};

use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use super::error::TrackerError;
use super::response::{parse_compact_peers, parse_compact_peers6, AnnounceResponse, TrackerEvent};
use crate::bencode::{decode, Value};
use crate::constants::{ANNOUNCE_LEFT, HTTP_NUMWANT};
use crate::info_hash::InfoHash;
use crate::peer::PeerId;

/// RFC 3986 unreserved characters stay literal, everything else is escaped.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub struct HttpTracker {
    client: Client,
    url: String,
}

impl HttpTracker {
    pub fn new(client: Client, url: &str) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::UnsupportedProtocol(url.to_string()));
        }

        Ok(Self {
            client,
            url: url.to_string(),
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
        let url = self.announce_url(info_hash, peer_id, port, event);

        let response = timeout_at(deadline, self.client.get(&url).send())
            .await
            .map_err(|_| TrackerError::Timeout)??;

        if response.status() != StatusCode::OK {
            return Err(TrackerError::HttpStatus(response.status().as_u16()));
        }

        let body = timeout_at(deadline, response.bytes())
            .await
            .map_err(|_| TrackerError::Timeout)??;

        parse_announce_body(&body)
    }

    fn announce_url(
        &self,
        info_hash: &InfoHash,
        peer_id: &PeerId,
        port: u16,
        event: TrackerEvent,
    ) -> String {
        let joiner = if self.url.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1&no_peer_id=1&numwant={}",
            self.url,
            joiner,
            percent_encode(info_hash.as_bytes(), QUERY_ESCAPE),
            percent_encode(peer_id.as_bytes(), QUERY_ESCAPE),
            port,
            ANNOUNCE_LEFT,
            HTTP_NUMWANT,
        );

        let event_str = event.as_str();
        if !event_str.is_empty() {
            url.push_str("&event=");
            url.push_str(event_str);
        }

        url
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Announces to an HTTP(S) tracker, degrading every failure (bad URL,
/// transport error, timeout, non-200, undecodable body, `failure reason`)
/// to the zero-value response.
pub async fn announce_http(
    client: &Client,
    url: &str,
    info_hash: &InfoHash,
    peer_id: &PeerId,
    listen_port: u16,
    deadline: Instant,
) -> AnnounceResponse {
    let result = match HttpTracker::new(client.clone(), url) {
        Ok(tracker) => {
            tracker
                .announce(info_hash, peer_id, listen_port, TrackerEvent::Started, deadline)
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            debug!(tracker = url, %err, "http announce failed");
            AnnounceResponse::default()
        }
    }
}

/// Parses a bencoded announce response body.
///
/// A response without any peer list is a valid, empty answer.
pub(crate) fn parse_announce_body(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = decode(body)?;
    let dict = value
        .as_dict()
        .ok_or_else(|| TrackerError::InvalidResponse("expected dict".into()))?;

    if let Some(failure) = dict.get(b"failure reason".as_slice()) {
        let reason = failure.as_str().unwrap_or("<binary>");
        return Err(TrackerError::Failure(reason.to_string()));
    }

    let peers = dict.get(b"peers".as_slice());
    let peers6 = dict.get(b"peers6".as_slice()).and_then(Value::as_bytes);
    if peers.is_none() && peers6.is_none() {
        return Ok(AnnounceResponse::default());
    }

    let field = |key: &[u8]| dict.get(key).and_then(Value::as_u32).unwrap_or(0);

    let mut response = AnnounceResponse {
        interval: field(b"interval"),
        seeders: field(b"complete"),
        leechers: field(b"incomplete"),
        peers: Vec::new(),
    };

    match peers {
        Some(Value::Bytes(compact)) => response.peers = parse_compact_peers(compact),
        Some(Value::List(list)) => response.peers = parse_peer_dicts(list),
        _ => {}
    }

    if let Some(compact6) = peers6 {
        response.peers.extend(parse_compact_peers6(compact6));
    }

    Ok(response)
}

/// Non-compact form: a list of `{ip, port[, peer id]}` dictionaries.
fn parse_peer_dicts(list: &[Value]) -> Vec<SocketAddr> {
    list.iter()
        .filter_map(|peer| {
            let ip: IpAddr = peer.get(b"ip")?.as_str()?.parse().ok()?;
            let port = u16::try_from(peer.get(b"port")?.as_integer()?).ok()?;
            (port != 0).then(|| SocketAddr::new(ip, port))
        })
        .collect()
}
