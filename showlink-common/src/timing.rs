//! Drift-corrected playback pacing
//!
//! Sleeping a fixed duration per frame accumulates error, because the
//! time spent rendering varies. The `Sleeper` instead anchors a wall
//! clock reference and a stream timestamp reference at the first frame
//! of a run and sleeps only the remaining delta:
//!
//! ```text
//! sleep = (stream_ts - stream_start) - (wall_now - wall_start) - tolerance
//! ```
//!
//! Only positive results sleep. `reset` clears both reference points
//! and must be called whenever playback resumes from a pause or
//! switches media item; otherwise drift accumulated during the pause
//! would be subtracted from the next sleep.

use std::time::{Duration, Instant};

/// Default pacing slack, absorbs scheduler wake-up latency
pub const DEFAULT_TOLERANCE_US: u64 = 2_000;

#[derive(Debug)]
pub struct Sleeper {
    wall_start: Option<Instant>,
    stream_start_us: Option<u64>,
    tolerance_us: u64,
}

impl Sleeper {
    pub fn new(tolerance_us: u64) -> Self {
        Self {
            wall_start: None,
            stream_start_us: None,
            tolerance_us,
        }
    }

    /// Clear both reference points; the next call to `due` anchors a
    /// fresh run
    pub fn reset(&mut self) {
        self.wall_start = None;
        self.stream_start_us = None;
    }

    /// Time to sleep before presenting the unit stamped
    /// `stream_timestamp_us`. The first call of a run anchors the
    /// reference points and returns zero.
    pub fn due(&mut self, stream_timestamp_us: u64) -> Duration {
        let (wall_start, stream_start) = match (self.wall_start, self.stream_start_us) {
            (Some(w), Some(s)) => (w, s),
            _ => {
                self.wall_start = Some(Instant::now());
                self.stream_start_us = Some(stream_timestamp_us);
                return Duration::ZERO;
            }
        };
        let stream_elapsed = stream_timestamp_us.saturating_sub(stream_start);
        let wall_elapsed = wall_start.elapsed().as_micros() as u64;
        let sleep = stream_elapsed
            .saturating_sub(wall_elapsed)
            .saturating_sub(self.tolerance_us);
        Duration::from_micros(sleep)
    }

    /// Sleep until the unit stamped `stream_timestamp_us` is due
    pub async fn pace(&mut self, stream_timestamp_us: u64) {
        let sleep = self.due(stream_timestamp_us);
        if !sleep.is_zero() {
            tokio::time::sleep(sleep).await;
        }
    }
}

impl Default for Sleeper {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_US)
    }
}
