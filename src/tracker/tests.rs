use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::time::Instant;

use super::http::parse_announce_body;
use super::udp::parse_udp_url;
use super::*;
use crate::info_hash::InfoHash;
use crate::peer::PeerId;
use crate::testing::{http_client, spawn_http_tracker, spawn_udp_tracker, UdpBehaviour, STRAY_PEER};

fn info_hash() -> InfoHash {
    InfoHash([0xab; 20])
}

fn deadline(ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(ms)
}

#[test]
fn test_tracker_event() {
    assert_eq!(TrackerEvent::Started.as_str(), "started");
    assert_eq!(TrackerEvent::None.as_str(), "");

    assert_eq!(TrackerEvent::None.as_udp_id(), 0);
    assert_eq!(TrackerEvent::Completed.as_udp_id(), 1);
    assert_eq!(TrackerEvent::Started.as_udp_id(), 2);
    assert_eq!(TrackerEvent::Stopped.as_udp_id(), 3);
}

#[test]
fn test_parse_compact_peers() {
    let data = [
        192, 168, 1, 1, 0x1A, 0xE1, // 192.168.1.1:6881
        10, 0, 0, 1, 0x00, 0x00, // port 0, dropped
        10, 0, 0, 2, 0x1A, 0xE2, // 10.0.0.2:6882
        1, 2, 3, // partial
    ];

    let peers = parse_compact_peers(&data);
    assert_eq!(
        peers,
        vec![
            "192.168.1.1:6881".parse::<SocketAddr>().unwrap(),
            "10.0.0.2:6882".parse().unwrap(),
        ]
    );
}

#[test]
fn test_parse_compact_peers6() {
    let mut data = vec![0u8; 15];
    data.push(1); // ::1
    data.extend_from_slice(&[0x1A, 0xE1]);

    let peers = parse_compact_peers6(&data);
    assert_eq!(peers, vec!["[::1]:6881".parse::<SocketAddr>().unwrap()]);
}

#[test]
fn test_parse_udp_url() {
    assert_eq!(
        parse_udp_url("udp://tracker.opentrackr.org:1337/announce").unwrap(),
        ("tracker.opentrackr.org".to_string(), 1337)
    );
    assert_eq!(
        parse_udp_url("udp://127.0.0.1:6969").unwrap(),
        ("127.0.0.1".to_string(), 6969)
    );
    assert_eq!(parse_udp_url("udp://[::1]:80/x").unwrap(), ("::1".to_string(), 80));

    assert!(matches!(
        parse_udp_url("http://example.com/announce"),
        Err(TrackerError::UnsupportedProtocol(_))
    ));
    for bad in ["udp://no-port/announce", "udp://host:0", "udp://host:99999", "udp://:80"] {
        assert!(
            matches!(parse_udp_url(bad), Err(TrackerError::InvalidUrl(_))),
            "{bad}"
        );
    }
}

#[test]
fn test_parse_announce_body_compact() {
    let body = b"d8:completei7e10:incompletei3e8:intervali1800e5:peers6:\x7f\x00\x00\x01\x1a\xe1e";
    let response = parse_announce_body(body).unwrap();

    assert_eq!(response.interval, 1800);
    assert_eq!(response.seeders, 7);
    assert_eq!(response.leechers, 3);
    assert_eq!(response.peers, vec!["127.0.0.1:6881".parse().unwrap()]);
}

#[test]
fn test_parse_announce_body_dict_peers() {
    let body = b"d8:intervali900e5:peersld2:ip8:10.0.0.17:peer id20:aaaaaaaaaaaaaaaaaaaa4:porti51413eed2:ip3:::14:porti0eeee";
    let response = parse_announce_body(body).unwrap();
    assert_eq!(response.peers, vec!["10.0.0.1:51413".parse().unwrap()]);
}

#[test]
fn test_parse_announce_body_peers6() {
    let mut body = b"d8:intervali60e5:peers0:6:peers618:".to_vec();
    body.extend_from_slice(&[0; 15]);
    body.extend_from_slice(&[1, 0x00, 0x50]);
    body.push(b'e');

    let response = parse_announce_body(&body).unwrap();
    assert_eq!(response.peers, vec!["[::1]:80".parse().unwrap()]);
}

#[test]
fn test_parse_announce_body_without_peers() {
    let response = parse_announce_body(b"d8:intervali1800ee").unwrap();
    assert_eq!(response, AnnounceResponse::default());
}

#[test]
fn test_parse_announce_body_failure() {
    let err = parse_announce_body(b"d14:failure reason12:unregisterede").unwrap_err();
    assert!(matches!(err, TrackerError::Failure(ref reason) if reason == "unregistered"));

    assert!(matches!(
        parse_announce_body(b"d5:peers"),
        Err(TrackerError::Bencode(_))
    ));
    assert!(matches!(
        parse_announce_body(b"li1ee"),
        Err(TrackerError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_udp_announce_skips_stray_transaction() {
    let peer = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 51413);
    let addr = spawn_udp_tracker(UdpBehaviour::Respond {
        peers: vec![peer],
        stray_first: true,
    })
    .await;

    let tracker = UdpTracker::connect("127.0.0.1", addr.port(), deadline(2000))
        .await
        .unwrap();
    assert_eq!(tracker.addr(), addr);

    let response = tracker
        .announce(&info_hash(), &PeerId::generate(), 6881, TrackerEvent::None, deadline(2000))
        .await
        .unwrap();

    assert_eq!(response.interval, 1800);
    assert_eq!(response.leechers, 3);
    assert_eq!(response.seeders, 1);
    assert_eq!(response.peers, vec![SocketAddr::V4(peer)]);
    assert!(!response.peers.contains(&SocketAddr::V4(STRAY_PEER)));
}

#[tokio::test]
async fn test_udp_announce_degrades() {
    let short = spawn_udp_tracker(UdpBehaviour::Short).await;
    let error = spawn_udp_tracker(UdpBehaviour::Error("torrent not registered")).await;
    let silent = spawn_udp_tracker(UdpBehaviour::Silent).await;
    let peer_id = PeerId::generate();

    for addr in [short, error] {
        let response =
            announce_udp("127.0.0.1", addr.port(), &info_hash(), &peer_id, 6881, deadline(2000)).await;
        assert_eq!(response, AnnounceResponse::default());
    }

    let started = Instant::now();
    let response =
        announce_udp("127.0.0.1", silent.port(), &info_hash(), &peer_id, 6881, deadline(300)).await;
    assert_eq!(response, AnnounceResponse::default());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_udp_strict_errors() {
    let error = spawn_udp_tracker(UdpBehaviour::Error("torrent not registered")).await;
    let tracker = UdpTracker::connect("127.0.0.1", error.port(), deadline(2000))
        .await
        .unwrap();
    let err = tracker
        .announce(&info_hash(), &PeerId::generate(), 6881, TrackerEvent::None, deadline(2000))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Failure(ref m) if m == "torrent not registered"));

    let silent = spawn_udp_tracker(UdpBehaviour::Silent).await;
    let err = UdpTracker::connect("127.0.0.1", silent.port(), deadline(200))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, TrackerError::Timeout));
}

#[tokio::test]
async fn test_http_announce() {
    let body = b"d8:completei2e10:incompletei1e8:intervali1800e5:peers6:\x0a\x00\x00\x07\x1a\xe1e".to_vec();
    let (url, request) = spawn_http_tracker("200 OK", body).await;
    let peer_id = PeerId::generate();

    let response =
        announce_http(&http_client(), &url, &info_hash(), &peer_id, 6881, deadline(3000)).await;
    assert_eq!(response.seeders, 2);
    assert_eq!(response.leechers, 1);
    assert_eq!(response.peers, vec!["10.0.0.7:6881".parse().unwrap()]);

    let request_line = request.await.unwrap();
    assert!(request_line.starts_with("GET /announce?info_hash=%AB%AB"));
    assert!(request_line.contains("&port=6881&"));
    assert!(request_line.contains("&left=16384&"));
    assert!(request_line.contains("&compact=1&"));
    assert!(request_line.contains("&numwant=200"));
    assert!(request_line.contains("&event=started"));
}

#[tokio::test]
async fn test_http_announce_degrades() {
    let (not_found, _) = spawn_http_tracker("404 Not Found", b"nope".to_vec()).await;
    let (failure, _) = spawn_http_tracker("200 OK", b"d14:failure reason4:nopee".to_vec()).await;
    let (garbage, _) = spawn_http_tracker("200 OK", b"<html>".to_vec()).await;
    let peer_id = PeerId::generate();

    for url in [not_found, failure, garbage] {
        let response =
            announce_http(&http_client(), &url, &info_hash(), &peer_id, 6881, deadline(3000)).await;
        assert_eq!(response, AnnounceResponse::default(), "{url}");
    }
}

#[tokio::test]
async fn test_http_strict_status() {
    let (url, _) = spawn_http_tracker("503 Service Unavailable", Vec::new()).await;
    let tracker = HttpTracker::new(http_client(), &url).unwrap();
    assert_eq!(tracker.url(), url);
    let err = tracker
        .announce(&info_hash(), &PeerId::generate(), 6881, TrackerEvent::Started, deadline(3000))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::HttpStatus(503)));

    assert!(matches!(
        HttpTracker::new(http_client(), "ftp://tracker.example.com"),
        Err(TrackerError::UnsupportedProtocol(_))
    ));
}

#[tokio::test]
async fn test_client_dispatches_by_scheme() {
    let peer = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 2), 7000);
    let addr = spawn_udp_tracker(UdpBehaviour::Respond {
        peers: vec![peer],
        stray_first: false,
    })
    .await;

    let peer_id = PeerId::generate();
    let client = TrackerClient::new(
        peer_id,
        6881,
        Duration::from_secs(2),
        Duration::from_secs(2),
    )
    .unwrap();
    assert_eq!(client.peer_id(), &peer_id);

    let url = format!("udp://127.0.0.1:{}/announce", addr.port());
    let response = client.announce(&url, &info_hash(), deadline(3000)).await;
    assert_eq!(response.peers, vec![SocketAddr::V4(peer)]);

    for url in ["wss://tracker.example.com", "udp://missing-port", ""] {
        let response = client.announce(url, &info_hash(), deadline(500)).await;
        assert!(response.is_empty());
    }
}

#[tokio::test]
async fn test_client_udp_timeout_caps_deadline() {
    let silent = spawn_udp_tracker(UdpBehaviour::Silent).await;
    let client = TrackerClient::new(
        PeerId::generate(),
        6881,
        Duration::from_millis(200),
        Duration::from_secs(2),
    )
    .unwrap();

    let started = Instant::now();
    let url = format!("udp://127.0.0.1:{}", silent.port());
    let response = client.announce(&url, &info_hash(), deadline(10_000)).await;
    assert!(response.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
}
