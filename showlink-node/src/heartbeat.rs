//! Heartbeat listener
//!
//! Serves one `BufferMetrics` snapshot per accepted connection, then
//! closes. The master's buffer watcher polls this port on a fixed
//! period.

use crate::buffer::MediaBuffer;
use showlink_common::wire;
use showlink_common::Result;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn serve_heartbeat(
    listener: TcpListener,
    buffer: Arc<MediaBuffer>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("heartbeat listener on {}", addr);
    }
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted,
        };
        let (mut stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("heartbeat accept failed: {}", e);
                continue;
            }
        };
        let snapshot = buffer.metrics();
        tokio::spawn(async move {
            if let Err(e) = wire::write_message(&mut stream, &snapshot).await {
                warn!("heartbeat write to {} failed: {}", peer, e);
                return;
            }
            let _ = stream.shutdown().await;
        });
    }
}
