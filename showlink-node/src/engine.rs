//! Node playback engine
//!
//! Wires the media buffer, the play flow, and the three playback tasks
//! together: a producer draining the decode collaborator, a render
//! consumer pacing frames against the drift-corrected sleeper, and an
//! audio consumer feeding the audio sink. Commands from the dispatcher
//! mutate the engine; nothing else does.

use crate::buffer::{FrameRead, MediaBuffer, SampleRead};
use crate::sink::{AudioSink, FrameSink};
use crate::source::MediaOpener;
use showlink_common::media::MediaUnit;
use showlink_common::playorder::{PlayFlow, PlayOrder};
use showlink_common::timing::Sleeper;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounded wait for playback tasks to wind down on stop
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

struct Run {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// One render node's playback engine
pub struct NodeEngine {
    buffer: Arc<MediaBuffer>,
    order: PlayOrder,
    flow: Arc<Mutex<PlayFlow>>,
    state: Arc<Mutex<PlaybackState>>,
    opener: Arc<dyn MediaOpener>,
    frame_sink: Arc<dyn FrameSink>,
    audio_sink: Arc<dyn AudioSink>,
    pace_tolerance_us: u64,
    run: Mutex<Option<Run>>,
}

impl NodeEngine {
    pub fn new(
        frame_capacity: usize,
        order: PlayOrder,
        pace_tolerance_us: u64,
        opener: Arc<dyn MediaOpener>,
        frame_sink: Arc<dyn FrameSink>,
        audio_sink: Arc<dyn AudioSink>,
    ) -> Self {
        let flow = order.create_play_flow();
        Self {
            buffer: Arc::new(MediaBuffer::new(frame_capacity)),
            order,
            flow: Arc::new(Mutex::new(flow)),
            state: Arc::new(Mutex::new(PlaybackState::Stopped)),
            opener,
            frame_sink,
            audio_sink,
            pace_tolerance_us,
            run: Mutex::new(None),
        }
    }

    pub fn buffer(&self) -> Arc<MediaBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }

    /// Begin (or resume) playback of the current flow. Returns false
    /// when already playing.
    pub fn start(&self) -> bool {
        let mut run = self.run.lock().unwrap();
        let current = *self.state.lock().unwrap();
        match current {
            PlaybackState::Playing => false,
            PlaybackState::Paused => {
                self.buffer.set_pause(false);
                *self.state.lock().unwrap() = PlaybackState::Playing;
                info!("playback resumed");
                true
            }
            PlaybackState::Stopped => {
                self.buffer.clear();
                self.buffer.set_pause(false);
                {
                    // A spent flow starts over; a pre-start redirect
                    // applied to a fresh flow survives
                    let mut flow = self.flow.lock().unwrap();
                    if flow.started() {
                        *flow = self.order.create_play_flow();
                    }
                }

                let cancel = CancellationToken::new();
                let tasks = vec![
                    tokio::spawn(produce(
                        Arc::clone(&self.buffer),
                        Arc::clone(&self.flow),
                        Arc::clone(&self.opener),
                        cancel.clone(),
                    )),
                    tokio::spawn(render(
                        Arc::clone(&self.buffer),
                        Arc::clone(&self.frame_sink),
                        Arc::clone(&self.state),
                        self.pace_tolerance_us,
                        cancel.clone(),
                    )),
                    tokio::spawn(play_audio(
                        Arc::clone(&self.buffer),
                        Arc::clone(&self.audio_sink),
                        cancel.clone(),
                    )),
                ];
                *run = Some(Run { cancel, tasks });
                *self.state.lock().unwrap() = PlaybackState::Playing;
                info!("playback started");
                true
            }
        }
    }

    /// Suspend or resume consumption; a no-op while stopped
    pub fn pause(&self, paused: bool) {
        let mut state = self.state.lock().unwrap();
        if *state == PlaybackState::Stopped {
            return;
        }
        self.buffer.set_pause(paused);
        *state = if paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        info!("playback {}", if paused { "paused" } else { "resumed" });
    }

    /// Redirect the next play position; unknown indices are ignored
    pub fn select(&self, index: u32) {
        if !self.order.contains(index) {
            debug!("select for unknown media index {} ignored", index);
            return;
        }
        self.flow.lock().unwrap().set_next_flow(index);
        info!("next play position redirected to media index {}", index);
    }

    /// Abort playback, drop buffered media, and wait (bounded) for the
    /// playback tasks to wind down. Idempotent.
    pub async fn stop(&self) {
        let run = self.run.lock().unwrap().take();
        let Some(run) = run else {
            return;
        };
        run.cancel.cancel();
        // Unblock a producer stuck on a full queue and paused readers
        self.buffer.set_pause(false);
        self.buffer.clear();
        for task in run.tasks {
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, task).await.is_err() {
                warn!("playback task did not stop within {:?}", STOP_JOIN_TIMEOUT);
            }
        }
        self.buffer.clear();
        *self.state.lock().unwrap() = PlaybackState::Stopped;
        info!("playback stopped");
    }

    /// Forward a fusion alignment request to the presentation layer
    pub fn fusion_test(&self, image: &str, factor: f32) {
        self.frame_sink.fusion_test(image, factor);
    }
}

/// Drain the decode collaborator into the buffer, item by item along
/// the flow, then mark the stream finished
async fn produce(
    buffer: Arc<MediaBuffer>,
    flow: Arc<Mutex<PlayFlow>>,
    opener: Arc<dyn MediaOpener>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let attribute = {
            let mut flow = flow.lock().unwrap();
            if flow.has_next() {
                flow.next().cloned()
            } else {
                None
            }
        };
        let Some(attribute) = attribute else {
            break;
        };
        debug!("decoding media index {}", attribute.index);
        let mut source = match opener.open(&attribute) {
            Ok(source) => source,
            Err(e) => {
                // Codec failure surfaces as stream end, never a crash
                warn!("cannot open media index {}: {}", attribute.index, e);
                buffer.finish();
                return;
            }
        };
        loop {
            let unit = tokio::select! {
                _ = cancel.cancelled() => return,
                unit = source.next_unit() => unit,
            };
            match unit {
                Ok(MediaUnit::Video(frame)) => {
                    let write = tokio::select! {
                        _ = cancel.cancelled() => return,
                        write = buffer.write_frame(frame) => write,
                    };
                    if write.is_err() {
                        return;
                    }
                }
                Ok(MediaUnit::Audio(sample)) => {
                    if buffer.write_sample(sample).is_err() {
                        return;
                    }
                }
                Ok(MediaUnit::End) => break,
                Err(e) => {
                    warn!("decode failure on media index {}: {}", attribute.index, e);
                    buffer.finish();
                    return;
                }
            }
        }
    }
    buffer.finish();
}

/// Consume frames against the drift-corrected clock
async fn render(
    buffer: Arc<MediaBuffer>,
    sink: Arc<dyn FrameSink>,
    state: Arc<Mutex<PlaybackState>>,
    pace_tolerance_us: u64,
    cancel: CancellationToken,
) {
    let mut sleeper = Sleeper::new(pace_tolerance_us);
    let mut current_index: Option<u32> = None;
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = buffer.read_frame() => read,
        };
        match read {
            FrameRead::Frame(frame) => {
                // Resynchronize the clock after a pause or item switch
                if buffer.had_pause() || current_index != Some(frame.attribute.index) {
                    sleeper.reset();
                    current_index = Some(frame.attribute.index);
                }
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = sleeper.pace(frame.timestamp_us) => {}
                }
                sink.present(&frame);
            }
            FrameRead::EndOfStream => {
                debug!("render loop reached end of stream");
                *state.lock().unwrap() = PlaybackState::Stopped;
                return;
            }
        }
    }
}

/// Consume samples; the audio device clocks itself
async fn play_audio(buffer: Arc<MediaBuffer>, sink: Arc<dyn AudioSink>, cancel: CancellationToken) {
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = buffer.read_sample() => read,
        };
        match read {
            SampleRead::Sample(sample) => sink.play(&sample),
            SampleRead::EndOfStream => return,
        }
    }
}
