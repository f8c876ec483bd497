//! Start sequencer
//!
//! Gates the synchronized START broadcast on cluster-wide buffer
//! readiness, then drives the wall-clock schedule of hardware triggers
//! along the play order. Only one sequence runs at a time: the
//! `started` flag is compare-and-set, a second start while running is
//! an idempotent rejection, and any failure on the way up resets the
//! flag so the operator can retry.
//!
//! Each schedule step measures the wall-clock latency of its own
//! hardware trigger call and sleeps `duration - latency - cut` — the
//! same drift correction the render clock applies, here on the command
//! thread, so hardware events stay aligned to the nominal program
//! timeline.

use crate::hardware::{HardwareIo, LightMode};
use crate::transport::WireTransport;
use crate::watcher::BufferWatcher;
use showlink_common::config::ScheduleConfig;
use showlink_common::node::NodeInformation;
use showlink_common::playorder::{PlayFlow, PlayOrder};
use showlink_common::protocol::Request;
use showlink_common::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounded wait for the schedule task to wind down on stop
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

struct Run {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct StartSequencer {
    started: Arc<AtomicBool>,
    transport: Arc<WireTransport>,
    watcher: Arc<BufferWatcher>,
    hardware: Arc<dyn HardwareIo>,
    /// Render nodes receiving the synchronized broadcasts
    targets: Vec<NodeInformation>,
    order: PlayOrder,
    flow: Arc<Mutex<PlayFlow>>,
    schedule: ScheduleConfig,
    run: Mutex<Option<Run>>,
}

impl StartSequencer {
    pub fn new(
        transport: Arc<WireTransport>,
        watcher: Arc<BufferWatcher>,
        hardware: Arc<dyn HardwareIo>,
        targets: Vec<NodeInformation>,
        order: PlayOrder,
        schedule: ScheduleConfig,
    ) -> Self {
        let flow = order.create_play_flow();
        Self {
            started: Arc::new(AtomicBool::new(false)),
            transport,
            watcher,
            hardware,
            targets,
            order,
            flow: Arc::new(Mutex::new(flow)),
            schedule,
            run: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Start the show.
    ///
    /// Returns `Ok(false)` when a sequence is already running (no side
    /// effects), `Err(NotReady)` when any renderer's buffer is
    /// insufficient, and propagates a transport failure from the
    /// broadcast — in both failure cases the started flag is reset so a
    /// retry is possible.
    pub async fn start(&self) -> Result<bool> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("start rejected, sequence already running");
            return Ok(false);
        }

        if self.watcher.is_buffer_insufficient() {
            self.started.store(false, Ordering::Release);
            return Err(Error::NotReady(
                "renderer buffers below start threshold".to_string(),
            ));
        }

        if let Err(e) = self
            .transport
            .send_all(&self.targets, &Request::Start, true)
            .await
        {
            self.started.store(false, Ordering::Release);
            warn!("start broadcast failed: {}", e);
            return Err(e);
        }
        info!("start broadcast delivered to {} nodes", self.targets.len());

        {
            let mut flow = self.flow.lock().unwrap();
            if flow.started() {
                *flow = self.order.create_play_flow();
            }
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_schedule(
            Arc::clone(&self.flow),
            Arc::clone(&self.hardware),
            self.schedule.clone(),
            Arc::clone(&self.started),
            cancel.clone(),
        ));
        *self.run.lock().unwrap() = Some(Run { cancel, task });
        Ok(true)
    }

    /// Redirect the next schedule position, keeping lights in step with
    /// a branch selection
    pub fn select(&self, index: u32) {
        self.flow.lock().unwrap().set_next_flow(index);
    }

    /// Cancel the schedule and broadcast STOP. Blocks (bounded) until
    /// the schedule task has terminated, so no trigger fires after this
    /// returns. A repeat stop on an idle sequencer is a silent no-op,
    /// nothing is rebroadcast.
    pub async fn stop(&self) {
        let run = self.run.lock().unwrap().take();
        let was_started = self.started.swap(false, Ordering::AcqRel);
        if run.is_none() && !was_started {
            return;
        }
        if let Some(run) = run {
            run.cancel.cancel();
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, run.task)
                .await
                .is_err()
            {
                warn!("schedule task did not stop within {:?}", STOP_JOIN_TIMEOUT);
            }
        }
        if let Err(e) = self
            .transport
            .send_all(&self.targets, &Request::Stop, false)
            .await
        {
            warn!("stop broadcast failed: {}", e);
        }
        info!("sequence stopped");
    }
}

async fn run_schedule(
    flow: Arc<Mutex<PlayFlow>>,
    hardware: Arc<dyn HardwareIo>,
    schedule: ScheduleConfig,
    started: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    if let Err(e) = hardware.initialize_rig().await {
        // Fatal to this step only; the schedule still runs
        warn!("rig initialization failed: {}", e);
    }

    loop {
        let item = {
            let mut flow = flow.lock().unwrap();
            if flow.has_next() {
                flow.next().cloned()
            } else {
                None
            }
        };
        let Some(item) = item else {
            break;
        };
        let position = {
            let flow = flow.lock().unwrap();
            flow.current_position().unwrap_or(0)
        };

        let trigger_start = Instant::now();
        if let Err(e) = hardware.trigger(LightMode::Scene(item.index)).await {
            warn!("trigger for item {} failed: {}", item.index, e);
        }
        let latency = trigger_start.elapsed();

        let cut = schedule.cut_for(position);
        let nominal = Duration::from_micros(item.duration_us.saturating_sub(cut));
        let sleep = nominal.saturating_sub(latency);
        debug!(
            "schedule position {} item {}: sleeping {:?} (latency {:?}, cut {}us)",
            position, item.index, sleep, latency, cut
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("schedule interrupted at position {}", position);
                break;
            }
            _ = tokio::time::sleep(sleep) => {}
        }
    }

    if let Err(e) = hardware.all_off().await {
        warn!("final all-off failed: {}", e);
    }
    started.store(false, Ordering::Release);
    info!("schedule complete");
}
