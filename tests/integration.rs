//! Integration tests: a live broker over real loopback sockets, driven
//! end to end by client helpers and a scripted editor.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use bytes::BytesMut;
use edrelay::{protocol, Broker, Connection, Message, RelayClient, RelayError};

/// Read one complete record from a blocking socket.
fn read_record(stream: &mut TcpStream, buf: &mut BytesMut) -> Message {
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(msg) = protocol::decode(buf) {
            return msg;
        }
        let n = stream.read(&mut chunk).unwrap();
        assert_ne!(n, 0, "socket closed while waiting for a record");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn write_record<B: AsRef<[u8]>>(stream: &mut TcpStream, fields: &[B]) {
    let mut buf = BytesMut::new();
    protocol::encode(fields, &mut buf);
    stream.write_all(&buf).unwrap();
}

/// Start a broker thread wired to a socket-pair editor. Returns the
/// editor-side socket, the listener port, and the broker thread, which
/// yields the terminal error once the editor socket is dropped.
fn spawn_broker() -> (TcpStream, u16, thread::JoinHandle<RelayError>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let editor_side = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    let editor = Connection::from_stream(accepted, "editor".to_string()).unwrap();

    let mut broker = Broker::bind(editor).unwrap();
    broker.announce_port().unwrap();
    let port = broker.port().unwrap();
    let handle = thread::spawn(move || {
        broker
            .run()
            .expect_err("the broker only stops when the editor goes away")
    });
    (editor_side, port, handle)
}

/// Scripted editor: consume the port announcement, then answer the given
/// number of requests with the matching response tag, echoing arguments.
fn run_echo_editor(mut sock: TcpStream, requests: usize) -> TcpStream {
    let mut buf = BytesMut::new();
    let announce = read_record(&mut sock, &mut buf);
    assert_eq!(announce.field(0), Some(&b""[..]));
    assert_eq!(announce.field(1), Some(&b"port"[..]));

    for _ in 0..requests {
        let req = read_record(&mut sock, &mut buf);
        // identity FS command FS args...
        let identity = req.field(0).unwrap().to_vec();
        let command = req.field_str(1).unwrap();
        let tag = protocol::response_tag(command).unwrap();

        let mut reply: Vec<Vec<u8>> = vec![identity, tag.as_bytes().to_vec()];
        for i in 2..req.len() {
            reply.push(req.field(i).unwrap().to_vec());
        }
        write_record(&mut sock, &reply);
    }
    sock
}

#[test]
fn test_end_to_end_request_response() {
    let (editor_side, port, broker) = spawn_broker();
    let editor = thread::spawn(move || run_echo_editor(editor_side, 1));

    let mut client = RelayClient::connect_to(port).unwrap();
    let reply = client
        .request_blocking(&["checktime"], "timechecked")
        .unwrap();
    assert_eq!(reply.len(), 1);
    assert_eq!(reply.first(), Some(&b"timechecked"[..]));

    drop(editor.join().unwrap());
    let err = broker.join().unwrap();
    assert!(matches!(err, RelayError::EditorLost(_)));
}

#[test]
fn test_concurrent_helpers_each_get_their_own_reply() {
    let (editor_side, port, broker) = spawn_broker();
    let editor = thread::spawn(move || run_echo_editor(editor_side, 2));

    let first = thread::spawn(move || {
        let mut client = RelayClient::connect_to(port).unwrap();
        client
            .request_blocking(&["edit", "/projects/alpha", "alpha.rs"], "done")
            .unwrap()
    });
    let second = thread::spawn(move || {
        let mut client = RelayClient::connect_to(port).unwrap();
        client
            .request_blocking(&["look", "needle-beta"], "looked")
            .unwrap()
    });

    let done = first.join().unwrap();
    assert_eq!(done.field(0), Some(&b"done"[..]));
    assert_eq!(done.field(1), Some(&b"/projects/alpha"[..]));
    assert_eq!(done.field(2), Some(&b"alpha.rs"[..]));

    let looked = second.join().unwrap();
    assert_eq!(looked.field(0), Some(&b"looked"[..]));
    assert_eq!(looked.field(1), Some(&b"needle-beta"[..]));

    drop(editor.join().unwrap());
    drop(broker.join().unwrap());
}

#[test]
fn test_payload_larger_than_one_read_chunk() {
    let (editor_side, port, broker) = spawn_broker();
    let editor = thread::spawn(move || run_echo_editor(editor_side, 1));

    // Well past the 1 KiB per-read chunk, so both directions take
    // several event-loop iterations to carry the record.
    let body = "x".repeat(8 * 1024);
    let mut client = RelayClient::connect_to(port).unwrap();
    let reply = client
        .request_blocking(&["change", "3", body.as_str()], "changed")
        .unwrap();
    assert_eq!(reply.field(0), Some(&b"changed"[..]));
    assert_eq!(reply.field(1), Some(&b"3"[..]));
    assert_eq!(reply.field(2), Some(body.as_bytes()));

    drop(editor.join().unwrap());
    drop(broker.join().unwrap());
}

#[test]
#[serial_test::serial]
fn test_helper_locates_broker_through_environment() {
    let (editor_side, port, broker) = spawn_broker();
    let editor = thread::spawn(move || run_echo_editor(editor_side, 1));

    std::env::set_var(edrelay::config::PORT_ENV, port.to_string());
    let mut client = RelayClient::connect().unwrap();
    std::env::remove_var(edrelay::config::PORT_ENV);

    let reply = client.request_blocking(&["bufinfo"], "bufinfo").unwrap();
    assert_eq!(reply.first(), Some(&b"bufinfo"[..]));

    drop(editor.join().unwrap());
    drop(broker.join().unwrap());
}

#[test]
fn test_client_request_fails_once_broker_is_gone() {
    let (editor_side, port, broker) = spawn_broker();

    let mut client = RelayClient::connect_to(port).unwrap();
    // Killing the editor takes the whole broker down with it.
    drop(editor_side);
    let err = broker.join().unwrap();
    assert!(matches!(err, RelayError::EditorLost(_)));

    let err = client
        .request_blocking(&["checktime"], "timechecked")
        .expect_err("broker is gone");
    assert!(matches!(err, RelayError::ConnectionClosed(_)));
}
