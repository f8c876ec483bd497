//! Media buffer with backpressure
//!
//! Bounded, pausable producer/consumer queue of decoded frames and
//! samples. The frame queue is bounded and blocks the producer when
//! full; the sample queue is unbounded, matching the asymmetric
//! backpressure of video versus audio. There is no timeout and no drop
//! policy: a stalled consumer stalls the whole pipeline, because
//! silently dropping frames would desynchronize audio and video.
//!
//! One producer and one consumer per queue. All waits use a single
//! `Notify` with the register-before-check pattern, so a state change
//! between releasing the lock and parking can never be missed.

use showlink_common::media::{Frame, Sample};
use showlink_common::metrics::{BufferMetrics, PlayPosition};
use showlink_common::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::trace;

/// One read from the frame side of the buffer
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    /// Terminal: repeated reads after the end keep returning this
    EndOfStream,
}

/// One read from the sample side of the buffer
#[derive(Debug)]
pub enum SampleRead {
    Sample(Sample),
    EndOfStream,
}

#[derive(Debug, Default)]
struct Inner {
    frames: VecDeque<Frame>,
    samples: VecDeque<Sample>,
    /// Producer signalled end of stream
    finished: bool,
    paused: bool,
    /// One-shot flag set when a reader leaves a pause
    had_pause: bool,
    current: Option<PlayPosition>,
    last_played: Option<PlayPosition>,
}

/// Bounded, pausable media queue shared between one producer and the
/// render/audio consumers
pub struct MediaBuffer {
    frame_capacity: usize,
    inner: Mutex<Inner>,
    changed: Notify,
    /// Running total of queued item weights, observability only
    heap_bytes: AtomicU64,
}

impl MediaBuffer {
    pub fn new(frame_capacity: usize) -> Self {
        Self {
            frame_capacity,
            inner: Mutex::new(Inner::default()),
            changed: Notify::new(),
            heap_bytes: AtomicU64::new(0),
        }
    }

    /// Queue a frame, waiting while the frame queue is at capacity
    pub async fn write_frame(&self, frame: Frame) -> Result<()> {
        let notified = self.changed.notified();
        tokio::pin!(notified);
        let mut frame = Some(frame);
        loop {
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().unwrap();
                if inner.finished {
                    return Err(Error::InvalidState(
                        "write_frame after end of stream".to_string(),
                    ));
                }
                if inner.frames.len() < self.frame_capacity {
                    let frame = frame.take().unwrap();
                    self.heap_bytes.fetch_add(frame.heap_size(), Ordering::Relaxed);
                    inner.frames.push_back(frame);
                    drop(inner);
                    self.changed.notify_waiters();
                    return Ok(());
                }
            }
            notified.as_mut().await;
            notified.set(self.changed.notified());
        }
    }

    /// Queue an audio sample; the sample queue never blocks the writer
    pub fn write_sample(&self, sample: Sample) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.finished {
                return Err(Error::InvalidState(
                    "write_sample after end of stream".to_string(),
                ));
            }
            self.heap_bytes.fetch_add(sample.heap_size(), Ordering::Relaxed);
            inner.samples.push_back(sample);
        }
        self.changed.notify_waiters();
        Ok(())
    }

    /// Mark the stream complete; readers drain the queues and then
    /// observe exactly one end marker
    pub fn finish(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.finished = true;
        }
        self.changed.notify_waiters();
    }

    /// Wait for the next frame or the end marker. Blocks while paused.
    pub async fn read_frame(&self) -> FrameRead {
        let notified = self.changed.notified();
        tokio::pin!(notified);
        let mut saw_pause = false;
        loop {
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().unwrap();
                if inner.paused {
                    saw_pause = true;
                } else if let Some(frame) = inner.frames.pop_front() {
                    self.heap_bytes.fetch_sub(frame.heap_size(), Ordering::Relaxed);
                    if saw_pause {
                        inner.had_pause = true;
                    }
                    let position = PlayPosition {
                        index: frame.attribute.index,
                        timestamp_us: frame.timestamp_us,
                        duration_us: frame.attribute.duration_us,
                    };
                    if let Some(current) = inner.current {
                        if current.index != position.index {
                            inner.last_played = Some(current);
                        }
                    }
                    inner.current = Some(position);
                    drop(inner);
                    self.changed.notify_waiters();
                    return FrameRead::Frame(frame);
                } else if inner.finished {
                    if saw_pause {
                        inner.had_pause = true;
                    }
                    if let Some(current) = inner.current.take() {
                        inner.last_played = Some(current);
                    }
                    return FrameRead::EndOfStream;
                }
            }
            notified.as_mut().await;
            notified.set(self.changed.notified());
        }
    }

    /// Wait for the next sample or the end marker. Blocks while paused.
    pub async fn read_sample(&self) -> SampleRead {
        let notified = self.changed.notified();
        tokio::pin!(notified);
        let mut saw_pause = false;
        loop {
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().unwrap();
                if inner.paused {
                    saw_pause = true;
                } else if let Some(sample) = inner.samples.pop_front() {
                    self.heap_bytes.fetch_sub(sample.heap_size(), Ordering::Relaxed);
                    if saw_pause {
                        inner.had_pause = true;
                    }
                    return SampleRead::Sample(sample);
                } else if inner.finished {
                    return SampleRead::EndOfStream;
                }
            }
            notified.as_mut().await;
            notified.set(self.changed.notified());
        }
    }

    /// Suspend or resume all reads. Writers are unaffected.
    pub fn set_pause(&self, paused: bool) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.paused = paused;
        }
        self.changed.notify_waiters();
        trace!("buffer pause set to {}", paused);
    }

    /// One-shot: true exactly once after a reader resumed from a pause
    pub fn had_pause(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        std::mem::take(&mut inner.had_pause)
    }

    /// Drop all queued items and reset accounting, used when playback
    /// is aborted mid-stream. Also lifts the end marker so the buffer
    /// can serve the next run.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.frames.clear();
            inner.samples.clear();
            inner.finished = false;
            inner.current = None;
            inner.last_played = None;
            self.heap_bytes.store(0, Ordering::Relaxed);
        }
        self.changed.notify_waiters();
    }

    /// Owned snapshot of the buffer's counters; never references live
    /// internals
    pub fn metrics(&self) -> BufferMetrics {
        let inner = self.inner.lock().unwrap();
        BufferMetrics {
            frame_count: inner.frames.len(),
            frame_capacity: self.frame_capacity,
            sample_count: inner.samples.len(),
            sample_capacity: usize::MAX,
            heap_bytes: self.heap_bytes.load(Ordering::Relaxed),
            current: inner.current,
            last_played: inner.last_played,
        }
    }

    pub fn frame_capacity(&self) -> usize {
        self.frame_capacity
    }
}
