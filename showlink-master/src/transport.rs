//! Wire transport with simultaneous fan-out
//!
//! Point-to-point sends open a fresh connection, write one object, and
//! close. The fan-out used for synchronized commands must deliver to
//! every node or to none: all connections are established first
//! (fail-fast — one refused connect aborts the broadcast before any
//! payload is written), then each connection is primed with warm-up
//! messages to absorb connection-setup jitter, and a barrier holds the
//! real payload back until every socket is hot. Four screens start in
//! visual sync only because no node can observe START before its
//! siblings finished warming up.

use showlink_common::config::TransportConfig;
use showlink_common::node::NodeInformation;
use showlink_common::protocol::Request;
use showlink_common::{wire, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Barrier;
use tracing::debug;

/// Priming messages written per connection before the barrier
pub const WARM_UP_MESSAGES: usize = 3;

pub struct WireTransport {
    send_timeout: Duration,
    fanout_timeout: Duration,
}

impl WireTransport {
    pub fn new(send_timeout: Duration, fanout_timeout: Duration) -> Self {
        Self {
            send_timeout,
            fanout_timeout,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            Duration::from_millis(config.send_timeout_ms),
            Duration::from_millis(config.fanout_timeout_ms),
        )
    }

    /// Send one request to one node over a fresh connection
    pub async fn send(&self, node: &NodeInformation, request: &Request) -> Result<()> {
        wire::send_request(&node.command_addr(), request, self.send_timeout).await
    }

    /// Deliver `request` to every node, all-or-nothing.
    ///
    /// With `need_warm_up` set, no node receives the real payload until
    /// every node is connected and primed. The whole fan-out is bounded
    /// by the configured timeout; exceeding it is an error, never a
    /// hang.
    pub async fn send_all(
        &self,
        nodes: &[NodeInformation],
        request: &Request,
        need_warm_up: bool,
    ) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        let mut targets = nodes.to_vec();
        targets.sort();

        let fanout = fan_out(targets, request.clone(), need_warm_up);
        match tokio::time::timeout(self.fanout_timeout, fanout).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "fan-out of {} exceeded {:?}",
                request, self.fanout_timeout
            ))),
        }
    }
}

async fn fan_out(targets: Vec<NodeInformation>, request: Request, need_warm_up: bool) -> Result<()> {
    // Phase 1: every connection must open before anything is written.
    // A single failure drops the already-opened connections unused.
    let connects = targets.iter().map(|node| {
        let addr = node.command_addr();
        let key = node.key();
        async move {
            TcpStream::connect(&addr)
                .await
                .map_err(|e| Error::Transport(format!("connect to {} failed: {}", key, e)))
        }
    });
    let streams = futures::future::try_join_all(connects).await?;
    debug!("fan-out connected to {} nodes", streams.len());

    // Phase 2: prime each socket, hold the payload at the barrier until
    // every sibling is primed, then write once per connection.
    let barrier = Arc::new(Barrier::new(streams.len()));
    let writes = streams.into_iter().zip(targets).map(|(mut stream, node)| {
        let barrier = Arc::clone(&barrier);
        let request = request.clone();
        async move {
            if need_warm_up {
                for _ in 0..WARM_UP_MESSAGES {
                    wire::write_message(&mut stream, &Request::WarmUp).await?;
                }
                barrier.wait().await;
            }
            wire::write_message(&mut stream, &request).await?;
            stream.shutdown().await?;
            debug!("delivered {} to {}", request, node.key());
            Ok::<(), Error>(())
        }
    });
    futures::future::try_join_all(writes).await?;
    Ok(())
}
