//! Integration tests for the fan-out transport
//!
//! Simulated nodes are plain TCP listeners recording what they receive.

use showlink_common::node::{NodeInformation, NodeRole};
use showlink_common::protocol::Request;
use showlink_common::wire;
use showlink_master::transport::{WireTransport, WARM_UP_MESSAGES};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn node_for(addr: SocketAddr, mac: &str) -> NodeInformation {
    NodeInformation {
        role: NodeRole::Video,
        address: addr.ip().to_string(),
        mac: mac.to_string(),
        command_port: addr.port(),
        heartbeat_port: addr.port(),
    }
}

/// Fake node: accepts one connection and records every request read
/// from it until the peer closes
async fn spawn_fake_node(mac: &str) -> (NodeInformation, JoinHandle<Vec<Request>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let node = node_for(listener.local_addr().unwrap(), mac);
    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        while let Ok(request) = wire::read_message::<Request, _>(&mut stream).await {
            received.push(request);
        }
        received
    });
    (node, task)
}

fn transport() -> WireTransport {
    WireTransport::new(Duration::from_secs(1), Duration::from_secs(3))
}

#[tokio::test]
async fn warmup_fanout_primes_every_node_before_the_payload() {
    let (node_a, task_a) = spawn_fake_node("aa").await;
    let (node_b, task_b) = spawn_fake_node("bb").await;
    let (node_c, task_c) = spawn_fake_node("cc").await;

    transport()
        .send_all(&[node_a, node_b, node_c], &Request::Start, true)
        .await
        .unwrap();

    for task in [task_a, task_b, task_c] {
        let received = task.await.unwrap();
        assert_eq!(received.len(), WARM_UP_MESSAGES + 1);
        assert!(received[..WARM_UP_MESSAGES]
            .iter()
            .all(|r| *r == Request::WarmUp));
        assert_eq!(received[WARM_UP_MESSAGES], Request::Start);
    }
}

#[tokio::test]
async fn fanout_without_warmup_sends_only_the_payload() {
    let (node_a, task_a) = spawn_fake_node("aa").await;
    let (node_b, task_b) = spawn_fake_node("bb").await;

    transport()
        .send_all(&[node_a, node_b], &Request::Stop, false)
        .await
        .unwrap();

    for task in [task_a, task_b] {
        assert_eq!(task.await.unwrap(), vec![Request::Stop]);
    }
}

#[tokio::test]
async fn one_failed_connect_means_zero_deliveries() {
    let (node_a, task_a) = spawn_fake_node("aa").await;

    // Bind and drop so the port is known-dead
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_node = node_for(dead.local_addr().unwrap(), "bb");
    drop(dead);

    let result = transport()
        .send_all(&[node_a, dead_node], &Request::Start, true)
        .await;
    assert!(result.is_err(), "broadcast must fail fast");

    // The reachable node saw its connection close without any payload
    let received = tokio::time::timeout(Duration::from_secs(2), task_a)
        .await
        .expect("fake node sees the connection close")
        .unwrap();
    assert!(
        !received.contains(&Request::Start),
        "no node may receive the real payload"
    );
}

#[tokio::test]
async fn empty_target_set_is_a_noop() {
    transport()
        .send_all(&[], &Request::Start, true)
        .await
        .unwrap();
}

#[tokio::test]
async fn fanout_is_bounded_by_its_timeout() {
    // Non-routable address: connect either hangs (caught by the
    // fan-out timeout) or fails fast; both surface as an error
    let unreachable = NodeInformation {
        role: NodeRole::Video,
        address: "10.255.255.1".to_string(),
        mac: "ff".to_string(),
        command_port: 9,
        heartbeat_port: 9,
    };
    let transport = WireTransport::new(Duration::from_millis(200), Duration::from_millis(300));
    let started = std::time::Instant::now();
    let result = transport
        .send_all(&[unreachable], &Request::Start, true)
        .await;
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(5), "must not hang");
}

#[tokio::test]
async fn warmup_fanout_delivers_the_payload_through_the_command_server() {
    // The real accept loop, not a fake: the primed connection must
    // surface exactly the payload in the dispatch queue
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let node = node_for(listener.local_addr().unwrap(), "aa");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    tokio::spawn(wire::serve_requests(listener, tx, cancel.clone()));

    transport()
        .send_all(&[node], &Request::Start, true)
        .await
        .unwrap();

    let request = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("payload reaches the command queue")
        .unwrap();
    assert_eq!(request, Request::Start);
    assert!(rx.try_recv().is_err(), "warm-ups must not be queued");
    cancel.cancel();
}

#[tokio::test]
async fn point_to_point_send_reaches_the_command_port() {
    let (node, task) = spawn_fake_node("aa").await;
    transport()
        .send(&node, &Request::Select { index: 2 })
        .await
        .unwrap();
    assert_eq!(task.await.unwrap(), vec![Request::Select { index: 2 }]);
}
