//! Loopback fakes for peers and trackers, shared by the unit tests.

use std::net::{SocketAddr, SocketAddrV4};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::constants::{EXTENSION_BIT, HANDSHAKE_LEN, METADATA_PIECE_SIZE};
use crate::info_hash::InfoHash;
use crate::peer::{ExtensionHandshake, Handshake, Message, MetadataMessage};

/// Sub-id the fake peer wants ut_metadata requests on.
pub(crate) const FAKE_PEER_METADATA_ID: u8 = 3;

const FAKE_PEER_ID: [u8; 20] = *b"-FK0001-abcdefghijkl";
const FAKE_CONNECTION_ID: u64 = 0x1122_3344_5566_7788;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Deterministic metadata of `len` bytes and its infohash.
pub(crate) fn fake_metadata(len: usize) -> (Bytes, InfoHash) {
    let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
    let info_hash = InfoHash::digest(&data);
    (Bytes::from(data), info_hash)
}

pub(crate) fn extension_reserved() -> [u8; 8] {
    let mut reserved = [0u8; 8];
    reserved[EXTENSION_BIT.0] |= EXTENSION_BIT.1;
    reserved
}

pub(crate) fn peer_handshake(info_hash: InfoHash, reserved: [u8; 8]) -> Bytes {
    Handshake::new(reserved, info_hash.0, FAKE_PEER_ID).encode()
}

pub(crate) fn extension_handshake_frame(ut_metadata: Option<u8>, metadata_size: Option<i64>) -> Bytes {
    let mut hs = match ut_metadata {
        Some(id) => ExtensionHandshake::with_extensions(&[("ut_metadata", id), ("ut_pex", 2)]),
        None => ExtensionHandshake::with_extensions(&[("ut_pex", 2)]),
    };
    hs.client = Some("fake 1.0".into());
    hs.metadata_size = metadata_size;

    Message::Extended {
        id: 0,
        payload: hs.encode().unwrap(),
    }
    .encode()
}

pub(crate) fn metadata_frame(id: u8, message: &MetadataMessage) -> Bytes {
    Message::Extended {
        id,
        payload: message.encode().unwrap(),
    }
    .encode()
}

/// Splits one length-prefixed frame off the front of `frame`.
pub(crate) fn parse_frame(frame: &[u8]) -> Message {
    let length = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    assert_eq!(frame.len(), 4 + length, "expected exactly one frame");
    Message::decode(Bytes::copy_from_slice(&frame[4..])).unwrap()
}

/// Data message for `piece` of `metadata`.
pub(crate) fn metadata_piece(metadata: &Bytes, piece: u32) -> MetadataMessage {
    let start = piece as usize * METADATA_PIECE_SIZE;
    let end = (start + METADATA_PIECE_SIZE).min(metadata.len());
    MetadataMessage::data(piece, metadata.len() as u32, metadata.slice(start..end))
}

pub(crate) enum PeerBehaviour {
    /// Handshake properly and serve these bytes as the metadata.
    Serve(Bytes),
    /// Read our handshake, then never answer.
    Silent,
}

#[derive(Debug, Default)]
pub(crate) struct PeerLog {
    pub(crate) requests: Vec<u32>,
    pub(crate) closed: bool,
}

pub(crate) struct FakePeer {
    pub(crate) addr: SocketAddr,
    /// Fires once the client's handshake has been read.
    pub(crate) handshake: oneshot::Receiver<()>,
    pub(crate) log: JoinHandle<PeerLog>,
}

/// A peer accepting exactly one connection for `info_hash`.
pub(crate) async fn spawn_fake_peer(info_hash: InfoHash, behaviour: PeerBehaviour) -> FakePeer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (handshake_tx, handshake) = oneshot::channel();

    let log = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        serve_peer(&mut stream, info_hash, behaviour, handshake_tx).await
    });

    FakePeer {
        addr,
        handshake,
        log,
    }
}

async fn serve_peer(
    stream: &mut TcpStream,
    info_hash: InfoHash,
    behaviour: PeerBehaviour,
    handshake_tx: oneshot::Sender<()>,
) -> PeerLog {
    let mut log = PeerLog::default();

    let mut handshake = [0u8; HANDSHAKE_LEN];
    if stream.read_exact(&mut handshake).await.is_err() {
        log.closed = true;
        return log;
    }
    let _ = handshake_tx.send(());

    let metadata = match behaviour {
        PeerBehaviour::Serve(metadata) => metadata,
        PeerBehaviour::Silent => {
            let mut byte = [0u8; 1];
            log.closed = matches!(stream.read(&mut byte).await, Ok(0) | Err(_));
            return log;
        }
    };

    let mut greeting = BytesMut::new();
    greeting.put_slice(&peer_handshake(info_hash, extension_reserved()));
    greeting.put_slice(&extension_handshake_frame(
        Some(FAKE_PEER_METADATA_ID),
        Some(metadata.len() as i64),
    ));
    if stream.write_all(&greeting).await.is_err() {
        log.closed = true;
        return log;
    }

    let mut client_metadata_id = None;
    loop {
        let Some(message) = read_message(stream).await else {
            log.closed = true;
            return log;
        };

        match message {
            Message::Extended { id: 0, payload } => {
                client_metadata_id = ExtensionHandshake::decode(&payload)
                    .ok()
                    .and_then(|hs| hs.get_extension_id("ut_metadata"));
            }
            Message::Extended {
                id: FAKE_PEER_METADATA_ID,
                payload,
            } => {
                let request = MetadataMessage::decode(&payload).unwrap();
                log.requests.push(request.piece);

                let reply = metadata_piece(&metadata, request.piece);
                let frame = metadata_frame(client_metadata_id.unwrap(), &reply);
                if stream.write_all(&frame).await.is_err() {
                    log.closed = true;
                    return log;
                }
            }
            _ => {}
        }
    }
}

async fn read_message(stream: &mut TcpStream) -> Option<Message> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await.ok()?;
    let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
    stream.read_exact(&mut body).await.ok()?;
    Message::decode(Bytes::from(body)).ok()
}

pub(crate) enum UdpBehaviour {
    /// Answer announces with these peers, optionally preceded by a reply
    /// carrying the wrong transaction id.
    Respond {
        peers: Vec<SocketAddrV4>,
        stray_first: bool,
    },
    /// Answer announces with a datagram too short to hold the header.
    Short,
    /// Answer announces with an error action.
    Error(&'static str),
    /// Never answer anything.
    Silent,
}

/// Peer the stray datagram advertises; must never reach a caller.
pub(crate) const STRAY_PEER: SocketAddrV4 = SocketAddrV4::new(std::net::Ipv4Addr::new(10, 9, 9, 9), 999);

pub(crate) async fn spawn_udp_tracker(behaviour: UdpBehaviour) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                return;
            };
            if matches!(behaviour, UdpBehaviour::Silent) || n < 16 {
                continue;
            }

            let mut request = &buf[..n];
            let _connection_id = request.get_u64();
            let action = request.get_u32();
            let tid = request.get_u32();

            let replies = match (action, &behaviour) {
                (0, _) => {
                    let mut reply = BytesMut::new();
                    reply.put_u32(0);
                    reply.put_u32(tid);
                    reply.put_u64(FAKE_CONNECTION_ID);
                    vec![reply]
                }
                (1, UdpBehaviour::Respond { peers, stray_first }) => {
                    let mut replies = Vec::new();
                    if *stray_first {
                        replies.push(announce_reply(tid.wrapping_add(1), &[STRAY_PEER]));
                    }
                    replies.push(announce_reply(tid, peers));
                    replies
                }
                (1, UdpBehaviour::Short) => {
                    let mut reply = BytesMut::new();
                    reply.put_u32(1);
                    reply.put_u32(tid);
                    reply.put_u32(1800);
                    vec![reply]
                }
                (1, UdpBehaviour::Error(message)) => {
                    let mut reply = BytesMut::new();
                    reply.put_u32(3);
                    reply.put_u32(tid);
                    reply.put_slice(message.as_bytes());
                    vec![reply]
                }
                _ => Vec::new(),
            };

            for reply in replies {
                let _ = socket.send_to(&reply, from).await;
            }
        }
    });

    addr
}

fn announce_reply(tid: u32, peers: &[SocketAddrV4]) -> BytesMut {
    let mut reply = BytesMut::new();
    reply.put_u32(1);
    reply.put_u32(tid);
    reply.put_u32(1800);
    reply.put_u32(3);
    reply.put_u32(peers.len() as u32);
    for peer in peers {
        reply.put_slice(&peer.ip().octets());
        reply.put_u16(peer.port());
    }
    reply
}

/// An HTTP tracker answering one request; the handle yields the request line.
pub(crate) async fn spawn_http_tracker(status: &'static str, body: Vec<u8>) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(&body).await.unwrap();
        let _ = stream.shutdown().await;

        String::from_utf8_lossy(&request)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    });

    (format!("http://{}/announce", addr), handle)
}

/// A reqwest client that ignores proxy settings from the environment.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
