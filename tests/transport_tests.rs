use bytes::BytesMut;
use proptest::prelude::*;
use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use testmonitor::transport::frame::{HEADER_LEN, MAX_PAYLOAD_LEN};
use testmonitor::transport::{
    Endpoint, FrameTransport, IpcClient, IpcServer, TransportError, decode_frame, encode_frame,
};

fn endpoint(dir: &TempDir, name: &str) -> Endpoint {
    Endpoint::at(dir.path().join(name))
}

/// Start a server on a background thread and connect a client to it.
fn connected_pair(dir: &TempDir) -> (IpcServer, IpcClient) {
    let endpoint = endpoint(dir, "pair.sock");
    let server_endpoint = endpoint.clone();
    let server = thread::spawn(move || {
        let mut server = IpcServer::new(server_endpoint);
        let connected = server.start(Duration::from_secs(5)).expect("start");
        assert!(connected, "client never connected");
        server
    });

    let mut client = IpcClient::new(endpoint);
    client
        .connect(
            Duration::from_secs(5),
            |_| {},
            |_, e| panic!("client failed to connect: {}", e),
        )
        .expect("connect");

    (server.join().expect("server thread"), client)
}

#[test]
fn test_zero_timeout_connect_without_peer() {
    let dir = TempDir::new().expect("tempdir");
    let mut client = IpcClient::new(endpoint(&dir, "nobody.sock"));
    let connected = Cell::new(false);
    let failed = Cell::new(false);

    client
        .connect(Duration::ZERO, |_| connected.set(true), |_, _| failed.set(true))
        .expect("a missing peer is not an error");

    assert!(failed.get());
    assert!(!connected.get());
    assert!(!client.is_connected());

    for _ in 0..3 {
        client.write(b"dropped").expect("write is a no-op");
    }
}

#[test]
fn test_positive_timeout_gives_up_at_deadline() {
    let dir = TempDir::new().expect("tempdir");
    let mut client = IpcClient::new(endpoint(&dir, "late.sock"));
    let failed = Cell::new(false);

    let started = Instant::now();
    client
        .connect(Duration::from_millis(150), |_| {}, |_, _| failed.set(true))
        .expect("timeout is not an error");

    assert!(failed.get());
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_client_waits_for_late_server() {
    let dir = TempDir::new().expect("tempdir");
    let endpoint = endpoint(&dir, "late-server.sock");
    let server_endpoint = endpoint.clone();

    let server = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        let mut server = IpcServer::new(server_endpoint);
        let connected = server.start(Duration::from_secs(5)).expect("start");
        (server, connected)
    });

    let mut client = IpcClient::new(endpoint);
    let connected = Cell::new(false);
    client
        .connect(
            Duration::from_secs(5),
            |_| connected.set(true),
            |_, e| panic!("unexpected failure: {}", e),
        )
        .expect("connect");

    assert!(connected.get());
    let (_server, server_connected) = server.join().expect("server thread");
    assert!(server_connected);
}

#[test]
fn test_frames_flow_both_ways() {
    let dir = TempDir::new().expect("tempdir");
    let (mut server, mut client) = connected_pair(&dir);

    server.write(b"from server").expect("server write");
    server.write(b"").expect("empty frame");
    client.write(b"from client").expect("client write");

    assert_eq!(client.read().expect("read"), Some(b"from server".to_vec()));
    assert_eq!(client.read().expect("read"), Some(Vec::new()));
    assert_eq!(server.read().expect("read"), Some(b"from client".to_vec()));

    server.dispose();
    assert_eq!(client.read().expect("read after peer closed"), None);
}

#[test]
fn test_oversized_write_is_rejected_without_sending() {
    let dir = TempDir::new().expect("tempdir");
    let (mut server, mut client) = connected_pair(&dir);

    let oversized = vec![7u8; MAX_PAYLOAD_LEN + 1];
    assert!(matches!(
        server.write(&oversized),
        Err(TransportError::PayloadTooLarge { .. })
    ));

    server.write(b"next").expect("write");
    assert_eq!(client.read().expect("read"), Some(b"next".to_vec()));
}

#[test]
fn test_write_after_peer_disconnect_drops_connection() {
    let dir = TempDir::new().expect("tempdir");
    let (mut server, mut client) = connected_pair(&dir);

    client.dispose();

    // The first writes may still land in the socket buffer
    let mut saw_error = false;
    for _ in 0..50 {
        if server.write(&[0u8; 1024]).is_err() {
            saw_error = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert!(saw_error);
    assert!(!server.is_connected());
    server.write(b"ignored").expect("no-op once disconnected");
}

#[test]
fn test_dispose_twice_is_harmless() {
    let dir = TempDir::new().expect("tempdir");
    let (mut server, mut client) = connected_pair(&dir);

    client.dispose();
    client.dispose();
    server.dispose();
    server.dispose();

    assert!(!client.is_connected());
    assert!(!server.is_connected());
    assert!(matches!(client.write(b"x"), Err(TransportError::Disposed(_))));
    assert!(matches!(server.write(b"x"), Err(TransportError::Disposed(_))));
}

proptest! {
    #[test]
    fn property_frame_preserves_payload(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let mut buf = BytesMut::new();
        encode_frame(&payload, &mut buf).expect("encode");

        prop_assert_eq!(buf.len(), HEADER_LEN + payload.len());
        let declared = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        prop_assert_eq!(declared, payload.len());

        let (decoded, consumed) = decode_frame(&buf).expect("decode").expect("complete frame");
        prop_assert_eq!(decoded, payload.as_slice());
        prop_assert_eq!(consumed, buf.len());
    }

    #[test]
    fn property_truncated_frame_is_incomplete(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        cut in any::<prop::sample::Index>(),
    ) {
        let mut buf = BytesMut::new();
        encode_frame(&payload, &mut buf).expect("encode");

        let cut = cut.index(buf.len());
        prop_assert!(decode_frame(&buf[..cut]).expect("decode").is_none());
    }
}

#[test]
fn test_payload_at_cap_is_accepted() {
    let payload = vec![1u8; MAX_PAYLOAD_LEN];
    let mut buf = BytesMut::new();
    encode_frame(&payload, &mut buf).expect("payload at the cap encodes");

    let (decoded, _) = decode_frame(&buf).expect("decode").expect("complete frame");
    assert_eq!(decoded.len(), MAX_PAYLOAD_LEN);
}
