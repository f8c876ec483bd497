//! Cluster buffer watcher
//!
//! Polls every renderer's heartbeat port for a `BufferMetrics` snapshot
//! and computes the cluster-wide readiness predicate. Starting with
//! even one under-buffered node causes visible stutter that cannot be
//! corrected after the fact, so readiness is all-or-nothing: a node
//! that fails a poll is simply absent from the snapshot set, and an
//! incomplete set counts as insufficient — never as a crash.

use showlink_common::metrics::BufferMetrics;
use showlink_common::node::NodeInformation;
use showlink_common::wire;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct BufferWatcher {
    /// Renderer nodes expected to respond, in fan-out order
    nodes: Vec<NodeInformation>,
    /// Frame fill ratio below which a node counts as under-buffered
    lower_limit: f64,
    poll_timeout: Duration,
    /// Latest snapshot set, replaced atomically by each poll
    snapshots: RwLock<HashMap<String, BufferMetrics>>,
}

impl BufferWatcher {
    pub fn new(nodes: Vec<NodeInformation>, lower_limit: f64, poll_timeout: Duration) -> Self {
        let mut nodes = nodes;
        nodes.sort();
        Self {
            nodes,
            lower_limit,
            poll_timeout,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Poll every renderer now and replace the snapshot set.
    ///
    /// Each poll is a fresh connection reading one snapshot. A node
    /// that fails to respond is logged and left out of the set.
    pub async fn check_now(&self) {
        let polls = self.nodes.iter().map(|node| {
            let addr = node.heartbeat_addr();
            let key = node.key();
            let timeout = self.poll_timeout;
            async move { (key, wire::fetch_metrics(&addr, timeout).await) }
        });
        let results = futures::future::join_all(polls).await;

        let mut set = HashMap::new();
        for (key, result) in results {
            match result {
                Ok(metrics) => {
                    set.insert(key, metrics);
                }
                Err(e) => warn!("heartbeat poll of {} failed: {}", key, e),
            }
        }
        debug!("snapshot set covers {}/{} nodes", set.len(), self.nodes.len());
        *self.snapshots.write().unwrap() = set;
    }

    /// True when the cluster cannot start without stutter: the snapshot
    /// set is incomplete, or any responding node's frame fill ratio is
    /// below the lower limit.
    pub fn is_buffer_insufficient(&self) -> bool {
        let snapshots = self.snapshots.read().unwrap();
        if snapshots.len() < self.nodes.len() {
            return true;
        }
        snapshots
            .values()
            .any(|metrics| metrics.frame_ratio() < self.lower_limit)
    }

    /// Veto for live branch selection: true when the snapshot set is
    /// incomplete and the cluster state cannot be trusted
    pub fn is_conflict_with_buffer(&self, index: u32) -> bool {
        let snapshots = self.snapshots.read().unwrap();
        let incomplete = snapshots.len() < self.nodes.len();
        if incomplete {
            debug!(
                "selection of index {} vetoed, only {}/{} nodes in snapshot",
                index,
                snapshots.len(),
                self.nodes.len()
            );
        }
        incomplete
    }

    /// Owned copy of the current snapshot set
    pub fn snapshots(&self) -> HashMap<String, BufferMetrics> {
        self.snapshots.read().unwrap().clone()
    }

    pub fn cluster_size(&self) -> usize {
        self.nodes.len()
    }

    /// Poll on a fixed period until cancelled
    pub fn spawn_polling(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let watcher = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => watcher.check_now().await,
                }
            }
        })
    }

    #[doc(hidden)]
    /// Test seam: install a snapshot set directly
    pub fn install_snapshots(&self, set: HashMap<String, BufferMetrics>) {
        *self.snapshots.write().unwrap() = set;
    }
}
