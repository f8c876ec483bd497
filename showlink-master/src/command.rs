//! Master-side command dispatch
//!
//! Operator requests (from the control station or the CLI) arrive on
//! the master's command port through the shared accept loop. One
//! dispatcher drains the queue; after each handled request any queued
//! burst is discarded, the same single-consumer shape the render nodes
//! use.

use crate::hardware::{HardwareIo, PowerControl};
use crate::sequencer::StartSequencer;
use crate::transport::WireTransport;
use crate::watcher::BufferWatcher;
use showlink_common::config::ClusterConfig;
use showlink_common::node::{NodeInformation, NodeRole};
use showlink_common::protocol::Request;
use showlink_common::Error;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a master request handler can reach
pub struct MasterContext {
    pub config: ClusterConfig,
    pub transport: Arc<WireTransport>,
    pub watcher: Arc<BufferWatcher>,
    pub sequencer: Arc<StartSequencer>,
    pub hardware: Arc<dyn HardwareIo>,
    pub power: Arc<dyn PowerControl>,
}

impl MasterContext {
    fn renderers(&self) -> Vec<NodeInformation> {
        self.config.renderers()
    }

    fn fusion_nodes(&self) -> Vec<NodeInformation> {
        self.config
            .nodes
            .iter()
            .filter(|n| n.role == NodeRole::Fusion)
            .cloned()
            .collect()
    }
}

/// Drain the master's inbound queue, one request at a time
pub async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Request>,
    context: Arc<MasterContext>,
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
        handle(&context, previous.as_ref(), &request, &shutdown).await;
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
    context: &MasterContext,
    previous: Option<&Request>,
    request: &Request,
    shutdown: &CancellationToken,
) {
    match request {
        Request::WarmUp => {}
        Request::Start => match context.sequencer.start().await {
            Ok(true) => info!("show started"),
            Ok(false) => info!("start ignored, show already running"),
            Err(Error::NotReady(reason)) => {
                // Explicit "not ready" back to the operator's log, never
                // a silent start
                warn!("start refused: {}", reason)
            }
            Err(e) => warn!("start failed: {}", e),
        },
        Request::Stop => context.sequencer.stop().await,
        Request::Pause { .. } => {
            if let Err(e) = context
                .transport
                .send_all(&context.renderers(), request, false)
                .await
            {
                warn!("pause broadcast failed: {}", e);
            }
        }
        Request::Select { index } => {
            if matches!(previous, Some(Request::Pause { paused: true })) {
                debug!("select following a pause");
            }
            if context.watcher.is_conflict_with_buffer(*index) {
                warn!("select {} vetoed, cluster snapshot incomplete", index);
                return;
            }
            if !context.config.is_selectable(*index) {
                debug!("select {} ignored, not offered by any branch", index);
                return;
            }
            context.sequencer.select(*index);
            if let Err(e) = context
                .transport
                .send_all(&context.renderers(), request, false)
                .await
            {
                warn!("select broadcast failed: {}", e);
            }
        }
        Request::FusionTest { .. } => {
            if let Err(e) = context
                .transport
                .send_all(&context.fusion_nodes(), request, false)
                .await
            {
                warn!("fusion test broadcast failed: {}", e);
            }
        }
        Request::Party { lamps } => {
            if let Err(e) = context.hardware.party_mode(*lamps).await {
                warn!("party mode failed: {}", e);
            }
        }
        Request::LightsOut => {
            if let Err(e) = context.hardware.all_off().await {
                warn!("lights out failed: {}", e);
            }
        }
        Request::Wake => {
            for node in context.renderers() {
                if let Err(e) = context.power.wake(&node).await {
                    warn!("wake of {} failed: {}", node.key(), e);
                }
            }
        }
        Request::Reboot | Request::Shutdown => {
            info!("{} requested, forwarding to renderers", request);
            context.sequencer.stop().await;
            if let Err(e) = context
                .transport
                .send_all(&context.renderers(), request, false)
                .await
            {
                warn!("{} broadcast failed: {}", request, e);
            }
            if matches!(request, Request::Shutdown) {
                shutdown.cancel();
            }
        }
    }
}
