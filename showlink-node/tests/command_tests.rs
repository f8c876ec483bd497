//! Integration tests for the node's command and heartbeat listeners

use showlink_common::media::{AudioFormat, MediaAttribute};
use showlink_common::playorder::PlayOrder;
use showlink_common::protocol::Request;
use showlink_common::wire;
use showlink_node::command;
use showlink_node::engine::{NodeEngine, PlaybackState};
use showlink_node::heartbeat;
use showlink_node::sink::NullSink;
use showlink_node::source::SyntheticOpener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn test_engine() -> Arc<NodeEngine> {
    let media = vec![MediaAttribute {
        index: 0,
        source: PathBuf::from("item0.mov"),
        duration_us: 5_000_000,
        audio_format: AudioFormat::default(),
    }];
    let order = PlayOrder::new(&media, &[0]).unwrap();
    Arc::new(NodeEngine::new(
        16,
        order,
        0,
        Arc::new(SyntheticOpener),
        Arc::new(NullSink),
        Arc::new(NullSink),
    ))
}

/// Bind an ephemeral port, returning the listener and its address
async fn bound_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

async fn wait_for_state(engine: &NodeEngine, state: PlaybackState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("engine never reached {:?}", state));
}

#[tokio::test]
async fn commands_over_the_wire_drive_the_engine() {
    let engine = test_engine();
    let cancel = CancellationToken::new();
    let (listener, addr) = bound_listener().await;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(wire::serve_requests(listener, tx, cancel.clone()));
    tokio::spawn(command::dispatch_loop(
        rx,
        Arc::clone(&engine),
        cancel.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let timeout = Duration::from_secs(1);
    wire::send_request(&addr, &Request::Start, timeout)
        .await
        .unwrap();
    wait_for_state(&engine, PlaybackState::Playing).await;

    wire::send_request(&addr, &Request::Pause { paused: true }, timeout)
        .await
        .unwrap();
    wait_for_state(&engine, PlaybackState::Paused).await;

    wire::send_request(&addr, &Request::Stop, timeout)
        .await
        .unwrap();
    wait_for_state(&engine, PlaybackState::Stopped).await;

    cancel.cancel();
    engine.stop().await;
}

#[tokio::test]
async fn shutdown_request_cancels_the_node() {
    let engine = test_engine();
    let cancel = CancellationToken::new();
    let (listener, addr) = bound_listener().await;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(wire::serve_requests(listener, tx, cancel.clone()));
    tokio::spawn(command::dispatch_loop(
        rx,
        Arc::clone(&engine),
        cancel.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    wire::send_request(&addr, &Request::Shutdown, Duration::from_secs(1))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(2), cancel.cancelled())
        .await
        .expect("shutdown cancels the node token");
}

#[tokio::test]
async fn heartbeat_serves_one_snapshot_per_connection() {
    let engine = test_engine();
    let cancel = CancellationToken::new();
    let (listener, addr) = bound_listener().await;

    tokio::spawn(heartbeat::serve_heartbeat(
        listener,
        engine.buffer(),
        cancel.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let metrics = wire::fetch_metrics(&addr, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(metrics.frame_capacity, 16);
    assert_eq!(metrics.frame_count, 0);

    // Fresh connection, fresh snapshot
    let again = wire::fetch_metrics(&addr, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(again.frame_capacity, 16);

    cancel.cancel();
}

#[tokio::test]
async fn malformed_payloads_are_dropped_not_fatal() {
    let engine = test_engine();
    let cancel = CancellationToken::new();
    let (listener, addr) = bound_listener().await;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(wire::serve_requests(listener, tx, cancel.clone()));
    tokio::spawn(command::dispatch_loop(
        rx,
        Arc::clone(&engine),
        cancel.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Garbage body under a valid length prefix
    {
        use tokio::io::AsyncWriteExt;
        let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let body = b"not json at all";
        stream
            .write_all(&(body.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(body).await.unwrap();
        stream.shutdown().await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The listener is still alive and serving real requests
    wire::send_request(&addr, &Request::Start, Duration::from_secs(1))
        .await
        .unwrap();
    wait_for_state(&engine, PlaybackState::Playing).await;

    cancel.cancel();
    engine.stop().await;
}
