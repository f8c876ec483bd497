//! Inbound command dispatch
//!
//! The accept loop (`wire::serve_requests`) drains each connection and
//! queues the requests it carries, warm-up frames already stripped;
//! exactly one dispatcher task drains that queue. The
//! dispatcher sees the previous request alongside the current one so
//! handlers can react to transitions, and after each handled request it
//! discards any burst that queued up behind a slow handler — acting on
//! stale commands is worse than dropping them.

use crate::engine::{NodeEngine, PlaybackState};
use showlink_common::protocol::Request;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drain the inbound queue, one request at a time
pub async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Request>,
    engine: Arc<NodeEngine>,
    shutdown: CancellationToken,
) {
    let mut previous: Option<Request> = None;
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => return,
            request = rx.recv() => match request {
                Some(request) => request,
                None => return,
            },
        };
        debug!("dispatching {}", request);
        handle(&engine, previous.as_ref(), &request, &shutdown).await;
        // Commands that queued while the handler ran are stale now
        let mut discarded = 0;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("discarded {} stale queued requests", discarded);
        }
        previous = Some(request);
    }
}

async fn handle(
    engine: &NodeEngine,
    previous: Option<&Request>,
    request: &Request,
    shutdown: &CancellationToken,
) {
    match request {
        Request::WarmUp => {}
        Request::Start => {
            if !engine.start() {
                debug!("start ignored, already playing");
            }
        }
        Request::Stop => engine.stop().await,
        Request::Pause { paused } => engine.pause(*paused),
        Request::Select { index } => {
            if matches!(previous, Some(Request::Pause { paused: true }))
                || engine.state() == PlaybackState::Paused
            {
                debug!("select while paused, applies on resume");
            }
            engine.select(*index);
        }
        Request::FusionTest { image, factor } => engine.fusion_test(image, *factor),
        // Lighting runs on the master's rig; nothing to do on a renderer
        Request::Party { .. } | Request::LightsOut => {
            debug!("{} ignored on render node", request)
        }
        Request::Wake => debug!("wake ignored, node already awake"),
        Request::Reboot | Request::Shutdown => {
            info!("{} requested, winding down", request);
            engine.stop().await;
            shutdown.cancel();
        }
    }
}
