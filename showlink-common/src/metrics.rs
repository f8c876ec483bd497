//! Buffer metrics snapshots
//!
//! `BufferMetrics` is the value type served on every heartbeat
//! connection. It is an owned copy of the buffer's counters at one
//! instant and never references live buffer internals; the master only
//! ever sees serialized snapshots.

use serde::{Deserialize, Serialize};

/// Position within the item currently being consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayPosition {
    pub index: u32,
    pub timestamp_us: u64,
    pub duration_us: u64,
}

/// Snapshot of one node's media buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferMetrics {
    pub frame_count: usize,
    pub frame_capacity: usize,
    pub sample_count: usize,
    /// Sample queue is unbounded; capacity reported for symmetry only
    pub sample_capacity: usize,
    /// Heap bytes held by queued frames and samples
    pub heap_bytes: u64,
    pub current: Option<PlayPosition>,
    pub last_played: Option<PlayPosition>,
}

impl BufferMetrics {
    /// Fill ratio of the bounded frame queue, in 0.0..=1.0
    pub fn frame_ratio(&self) -> f64 {
        if self.frame_capacity == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.frame_capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_ratio_handles_zero_capacity() {
        let metrics = BufferMetrics {
            frame_count: 10,
            frame_capacity: 0,
            sample_count: 0,
            sample_capacity: 0,
            heap_bytes: 0,
            current: None,
            last_played: None,
        };
        assert_eq!(metrics.frame_ratio(), 0.0);
    }

    #[test]
    fn frame_ratio_basic() {
        let metrics = BufferMetrics {
            frame_count: 95,
            frame_capacity: 100,
            sample_count: 0,
            sample_capacity: 0,
            heap_bytes: 0,
            current: None,
            last_played: None,
        };
        assert!((metrics.frame_ratio() - 0.95).abs() < f64::EPSILON);
    }
}
