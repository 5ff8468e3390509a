#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use super::{FileReceiver, FileSender, ServeReport, TransferError};
use crate::integrity::{Digest, digest_of};
use crate::log::{LogSink, NoopLogSink};
use crate::protocol::Msg;
use crate::store::FileStore;
use crate::transport::FramedChannel;

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

fn noop() -> Arc<dyn LogSink> {
    Arc::new(NoopLogSink)
}

fn pair() -> (FramedChannel<TcpStream>, FramedChannel<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let client = thread::spawn(move || FramedChannel::connect(&addr).unwrap());
    let (server, _) = listener.accept().unwrap();
    (FramedChannel::new(server), client.join().unwrap())
}

fn store_with(dir: &std::path::Path, name: &str, data: &[u8]) -> FileStore {
    let store = FileStore::new(dir);
    store.create(name).unwrap().write_all(data).unwrap();
    store
}

/// Play the session loop's part: take the `File` command off the wire, then
/// hand the request to the sender.
fn serve_request(
    sender: FileSender,
    mut server: FramedChannel<TcpStream>,
    expected: &'static str,
) -> thread::JoinHandle<Result<ServeReport, TransferError>> {
    thread::spawn(move || {
        assert_eq!(
            server.recv_timeout(WAIT).unwrap(),
            Msg::File { name: expected.into() }
        );
        sender.serve(&mut server, "peer", expected)
    })
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

#[test]
fn five_thousand_bytes_go_out_as_4096_then_904() {
    let dir = tempfile::tempdir().unwrap();
    let data = patterned(5000);
    let store = store_with(dir.path(), "notes.txt", &data);
    let (server, mut client) = pair();

    let sender = FileSender::new(store, 4096, WAIT, noop());
    let srv = serve_request(sender, server, "notes.txt");

    client.send(&Msg::File { name: "notes.txt".into() }).unwrap();
    match client.recv().unwrap() {
        Msg::Metadata { name, size, digest } => {
            assert_eq!(name, "notes.txt");
            assert_eq!(size, 5000);
            assert_eq!(digest, digest_of(&data));
        }
        other => panic!("expected Metadata, got {other:?}"),
    }
    client.send(&Msg::Ack).unwrap();

    let mut sizes = Vec::new();
    let mut reassembled = Vec::new();
    loop {
        match client.recv().unwrap() {
            Msg::Chunk { data } => {
                sizes.push(data.len());
                reassembled.extend_from_slice(&data);
                client.send(&Msg::Ack).unwrap();
            }
            Msg::Eof => {
                client.send(&Msg::Ack).unwrap();
                break;
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!(sizes, vec![4096, 904]);
    assert_eq!(reassembled, data);
    let report = srv.join().unwrap().unwrap();
    assert_eq!(report.size, 5000);
    assert_eq!(report.chunks, 2);
}

#[test]
fn missing_file_yields_not_found_and_no_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let (mut server, mut client) = pair();
    let sender = FileSender::new(FileStore::new(dir.path()), 4096, WAIT, noop());
    let srv = thread::spawn(move || {
        let res = sender.serve(&mut server, "peer", "ghost.bin");
        (res, server)
    });

    assert_eq!(
        client.recv_timeout(WAIT).unwrap(),
        Msg::NotFound { name: "ghost.bin".into() }
    );
    let (res, _server) = srv.join().unwrap();
    assert!(matches!(res, Err(TransferError::NotFound(_))));
    // nothing else was written after NotFound
    assert!(client.recv_timeout(Some(Duration::from_millis(100))).is_err());
}

#[test]
fn traversal_request_is_answered_with_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (mut server, mut client) = pair();
    let sender = FileSender::new(FileStore::new(dir.path()), 4096, WAIT, noop());
    let srv = thread::spawn(move || sender.serve(&mut server, "peer", "../secret"));
    assert_eq!(
        client.recv_timeout(WAIT).unwrap(),
        Msg::NotFound { name: "../secret".into() }
    );
    assert!(matches!(srv.join().unwrap(), Err(TransferError::NotFound(_))));
}

#[test]
fn nack_on_metadata_aborts_without_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with(dir.path(), "a.bin", b"abc");
    let (mut server, mut client) = pair();
    let sender = FileSender::new(store, 4096, WAIT, noop());
    let srv = thread::spawn(move || {
        let res = sender.serve(&mut server, "peer", "a.bin");
        (res, server)
    });

    assert!(matches!(client.recv().unwrap(), Msg::Metadata { .. }));
    client.send(&Msg::Nack).unwrap();

    let (res, _server) = srv.join().unwrap();
    assert!(matches!(res, Err(TransferError::TransferAborted(_))));
    assert!(client.recv_timeout(Some(Duration::from_millis(100))).is_err());
}

#[test]
fn new_request_mid_transfer_is_answered_with_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with(dir.path(), "a.bin", b"abc");
    let (mut server, mut client) = pair();
    let sender = FileSender::new(store, 4096, WAIT, noop());
    let srv = thread::spawn(move || {
        let res = sender.serve(&mut server, "peer", "a.bin");
        (res, server)
    });

    assert!(matches!(client.recv().unwrap(), Msg::Metadata { .. }));
    client.send(&Msg::File { name: "b.bin".into() }).unwrap();
    assert!(matches!(
        client.recv_timeout(WAIT).unwrap(),
        Msg::BadRequest { .. }
    ));

    let (res, _server) = srv.join().unwrap();
    match res {
        Err(TransferError::UnexpectedMsg(Msg::File { name })) => assert_eq!(name, "b.bin"),
        other => panic!("expected UnexpectedMsg(File), got {other:?}"),
    }
}

#[test]
fn silent_receiver_times_out_the_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with(dir.path(), "a.bin", b"abc");
    let (mut server, mut client) = pair();
    let sender = FileSender::new(store, 4096, Some(Duration::from_millis(100)), noop());
    let srv = thread::spawn(move || {
        let res = sender.serve(&mut server, "peer", "a.bin");
        (res, server)
    });

    assert!(matches!(client.recv().unwrap(), Msg::Metadata { .. }));
    let (res, _server) = srv.join().unwrap();
    match res {
        Err(TransferError::TransferAborted(why)) => assert!(why.contains("timeout")),
        other => panic!("expected abort, got {other:?}"),
    }
}

#[test]
fn receiver_round_trips_contents_of_various_sizes() {
    for len in [0usize, 1, 4095, 4096, 4097, 20_000] {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let data = patterned(len);
        let store = store_with(src.path(), "f.bin", &data);
        let (server, mut client) = pair();

        let sender = FileSender::new(store, 4096, WAIT, noop());
        let srv = serve_request(sender, server, "f.bin");

        let receiver = FileReceiver::new(FileStore::new(dst.path()), WAIT, noop());
        let report = receiver.fetch(&mut client, "f.bin").unwrap();
        let served = srv.join().unwrap().unwrap();

        assert_eq!(report.size, len as u64);
        assert_eq!(report.digest, digest_of(&data));
        assert_eq!(report.chunks, served.chunks);
        assert_eq!(report.chunks as usize, len.div_ceil(4096));
        assert_eq!(std::fs::read(dst.path().join("f.bin")).unwrap(), data);
    }
}

#[test]
fn empty_file_has_empty_digest_and_no_chunks() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let store = store_with(src.path(), "empty", b"");
    let (server, mut client) = pair();
    let sender = FileSender::new(store, 4096, WAIT, noop());
    let srv = serve_request(sender, server, "empty");

    let receiver = FileReceiver::new(FileStore::new(dst.path()), WAIT, noop());
    let report = receiver.fetch(&mut client, "empty").unwrap();
    assert_eq!(report.digest, Digest::empty());
    assert_eq!(report.chunks, 0);
    assert_eq!(srv.join().unwrap().unwrap().chunks, 0);
}

#[test]
fn receiver_nacks_metadata_for_another_name() {
    let dst = tempfile::tempdir().unwrap();
    let (mut server, mut client) = pair();
    let fake = thread::spawn(move || {
        assert_eq!(server.recv().unwrap(), Msg::File { name: "wanted".into() });
        server
            .send(&Msg::Metadata {
                name: "other".into(),
                size: 1,
                digest: digest_of(b"x"),
            })
            .unwrap();
        server.recv().unwrap()
    });

    let receiver = FileReceiver::new(FileStore::new(dst.path()), WAIT, noop());
    let err = receiver.fetch(&mut client, "wanted").unwrap_err();
    assert!(matches!(err, TransferError::NameMismatch { .. }));
    assert_eq!(fake.join().unwrap(), Msg::Nack);
    assert!(!dst.path().join("wanted").exists());
}

#[test]
fn corrupted_digest_is_reported_as_verification_failure() {
    let dst = tempfile::tempdir().unwrap();
    let (mut server, mut client) = pair();
    let fake = thread::spawn(move || {
        server.recv().unwrap();
        server
            .send(&Msg::Metadata {
                name: "f".into(),
                size: 3,
                digest: digest_of(b"xyz"),
            })
            .unwrap();
        assert_eq!(server.recv().unwrap(), Msg::Ack);
        server.send(&Msg::Chunk { data: Bytes::from_static(b"abc") }).unwrap();
        assert_eq!(server.recv().unwrap(), Msg::Ack);
        server.send(&Msg::Eof).unwrap();
        assert_eq!(server.recv().unwrap(), Msg::Ack);
    });

    let receiver = FileReceiver::new(FileStore::new(dst.path()), WAIT, noop());
    let err = receiver.fetch(&mut client, "f").unwrap_err();
    fake.join().unwrap();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        TransferError::VerificationFailed { expected_size: 3, actual_size: 3, .. }
    ));
    // partial copy stays for the caller to decide
    assert_eq!(std::fs::read(dst.path().join("f")).unwrap(), b"abc");
}

#[test]
fn server_error_mid_transfer_is_surfaced() {
    let dst = tempfile::tempdir().unwrap();
    let (mut server, mut client) = pair();
    let fake = thread::spawn(move || {
        server.recv().unwrap();
        server
            .send(&Msg::Metadata { name: "f".into(), size: 10, digest: Digest::empty() })
            .unwrap();
        server.recv().unwrap();
        server
            .send(&Msg::ServerError { reason: "disk gone".into() })
            .unwrap();
        server
    });

    let receiver = FileReceiver::new(FileStore::new(dst.path()), WAIT, noop());
    match receiver.fetch(&mut client, "f") {
        Err(TransferError::ServerError(reason)) => assert_eq!(reason, "disk gone"),
        other => panic!("expected ServerError, got {other:?}"),
    }
    let _server = fake.join().unwrap();
}

#[test]
fn invalid_local_name_is_rejected_before_sending() {
    let dst = tempfile::tempdir().unwrap();
    let (_server, mut client) = pair();
    let receiver = FileReceiver::new(FileStore::new(dst.path()), WAIT, noop());
    assert!(matches!(
        receiver.fetch(&mut client, "a/b"),
        Err(TransferError::InvalidName(_))
    ));
}

#[cfg(feature = "log-warn")]
#[test]
fn refused_names_are_logged_with_the_peer() {
    use crate::log::{LogLevel, MemoryLogSink};

    let dir = tempfile::tempdir().unwrap();
    let mem = Arc::new(MemoryLogSink::new());
    let (mut server, mut client) = pair();
    let sender = FileSender::new(FileStore::new(dir.path()), 4096, WAIT, mem.clone());
    let res = thread::spawn(move || sender.serve(&mut server, "10.0.0.9:1234", "a\\b"))
        .join()
        .unwrap();

    assert!(matches!(res, Err(TransferError::NotFound(_))));
    assert!(matches!(client.recv().unwrap(), Msg::NotFound { .. }));
    assert!(mem.contains(LogLevel::Warn, "10.0.0.9:1234"));
}
