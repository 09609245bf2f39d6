//! Agent-side sender against a live collector on an ephemeral port.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use framecast_collector::config::{PayloadKind, ServerConfig, TlsConfig};
use framecast_collector::server;
use framecast_collector::storage::{FrameStore, run_writer};
use framecast_core::{Batch, Endpoint, Frame, FrameQueue, FrameSink, HttpSender, TrustMode};
use tokio_util::sync::CancellationToken;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("framecast-rt-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn local_server(payload: PayloadKind) -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1".into(),
        port: 0,
        payload,
        tls: TlsConfig {
            enabled: false,
            ..TlsConfig::default()
        },
        ..ServerConfig::default()
    }
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[actix_web::test]
async fn batch_is_unbatched_and_persisted() {
    let dir = scratch_dir("batch");
    let queue = Arc::new(FrameQueue::new(100));
    let store = FrameStore::new(&dir).unwrap();
    let shutdown = CancellationToken::new();
    let writer = actix_web::rt::spawn(run_writer(Arc::clone(&queue), store, shutdown.clone()));

    let (srv, addrs) =
        tokio_test::assert_ok!(server::bind(&local_server(PayloadKind::Batch), Arc::clone(&queue)));
    let handle = srv.handle();
    actix_web::rt::spawn(srv);

    let endpoint = Endpoint::new("http", "127.0.0.1", addrs[0].port());
    let sender = tokio_test::assert_ok!(HttpSender::new(
        &endpoint,
        TrustMode::Strict,
        Some(Duration::from_secs(5))
    ));

    let mut jpeg_like = vec![0xFF, 0xD8, 0xFF];
    jpeg_like.extend_from_slice(&[7; 29]);
    let frames = vec![
        Frame::new(jpeg_like),
        Frame::new(vec![1u8; 64]),
        Frame::new(vec![2u8; 16]),
    ];
    let batch = Batch::assemble(&frames).unwrap();
    let outcome = sender.send(batch.into_bytes()).await;
    assert!(outcome.is_delivered(), "{outcome}");

    handle.stop(true).await;
    shutdown.cancel();
    let saved = writer.await.unwrap();
    assert_eq!(saved, 3);

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|n| n.starts_with("frame_")));
    assert_eq!(names.iter().filter(|n| n.ends_with(".jpg")).count(), 1);
    assert_eq!(names.iter().filter(|n| n.ends_with(".rgba")).count(), 2);
    let _ = std::fs::remove_dir_all(&dir);
}

#[actix_web::test]
async fn single_frame_mode_stores_body_verbatim() {
    let dir = scratch_dir("single");
    let queue = Arc::new(FrameQueue::new(10));

    let (srv, addrs) =
        tokio_test::assert_ok!(server::bind(&local_server(PayloadKind::Single), Arc::clone(&queue)));
    let handle = srv.handle();
    actix_web::rt::spawn(srv);

    let endpoint = Endpoint::new("http", "127.0.0.1", addrs[0].port());
    let sender = HttpSender::new(&endpoint, TrustMode::Bypass, None).unwrap();
    let outcome = sender.send(bytes::Bytes::from_static(b"\x28\xb5\x2f\xfdpayload")).await;
    assert!(outcome.is_delivered());
    handle.stop(true).await;

    let store = FrameStore::new(&dir).unwrap();
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    assert_eq!(run_writer(queue, store, shutdown).await, 1);

    let entry = std::fs::read_dir(&dir).unwrap().next().unwrap().unwrap();
    assert!(entry.file_name().to_string_lossy().ends_with(".zst"));
    assert_eq!(std::fs::read(entry.path()).unwrap(), b"\x28\xb5\x2f\xfdpayload");
    let _ = std::fs::remove_dir_all(&dir);
}

#[actix_web::test]
async fn https_sender_reaches_self_signed_collector() {
    let queue = Arc::new(FrameQueue::new(10));
    let config = ServerConfig {
        tls: TlsConfig {
            enabled: true,
            cert: fixture("cert.pem"),
            key: fixture("key.pem"),
        },
        ..local_server(PayloadKind::Batch)
    };
    let (srv, addrs) = tokio_test::assert_ok!(server::bind(&config, Arc::clone(&queue)));
    let handle = srv.handle();
    actix_web::rt::spawn(srv);

    let endpoint = Endpoint::new("https", "127.0.0.1", addrs[0].port());
    let frames = vec![Frame::new(vec![3u8; 24]), Frame::new(vec![4u8; 24])];
    let body = Batch::assemble(&frames).unwrap().into_bytes();

    // Certificate checks on: the self-signed chain is refused.
    let strict = tokio_test::assert_ok!(HttpSender::new(
        &endpoint,
        TrustMode::Strict,
        Some(Duration::from_secs(5))
    ));
    assert!(!strict.send(body.clone()).await.is_delivered());
    assert!(queue.is_empty());

    let bypass = tokio_test::assert_ok!(HttpSender::new(
        &endpoint,
        TrustMode::Bypass,
        Some(Duration::from_secs(5))
    ));
    let outcome = bypass.send(body).await;
    assert!(outcome.is_delivered(), "{outcome}");
    handle.stop(true).await;

    assert_eq!(queue.try_dequeue_batch(2).unwrap(), frames);
}

#[actix_web::test]
async fn plaintext_sender_is_refused_by_tls_listener() {
    let queue = Arc::new(FrameQueue::new(10));
    let config = ServerConfig {
        tls: TlsConfig {
            enabled: true,
            cert: fixture("cert.pem"),
            key: fixture("key.pem"),
        },
        ..local_server(PayloadKind::Single)
    };
    let (srv, addrs) = tokio_test::assert_ok!(server::bind(&config, Arc::clone(&queue)));
    let handle = srv.handle();
    actix_web::rt::spawn(srv);

    let endpoint = Endpoint::new("http", "127.0.0.1", addrs[0].port());
    let sender = tokio_test::assert_ok!(HttpSender::new(
        &endpoint,
        TrustMode::Bypass,
        Some(Duration::from_secs(5))
    ));
    assert!(!sender.send(bytes::Bytes::from_static(b"frame")).await.is_delivered());
    handle.stop(true).await;
    assert!(queue.is_empty());
}
