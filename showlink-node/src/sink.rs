//! Presentation seam
//!
//! Rendering and audio output live outside the coordination layer; the
//! consumer loops hand each unit to these capabilities and nothing
//! else. The `NullSink` logs and discards, which is enough to run a
//! node headless.

use showlink_common::media::{Frame, Sample};
use tracing::{debug, trace};

/// Video presentation capability
pub trait FrameSink: Send + Sync {
    /// Present one frame; called from the render loop after pacing
    fn present(&self, frame: &Frame);

    /// Show a fusion alignment image at the given blend factor
    fn fusion_test(&self, image: &str, factor: f32);
}

/// Audio output capability
pub trait AudioSink: Send + Sync {
    fn play(&self, sample: &Sample);
}

/// Headless sink: logs and discards
#[derive(Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&self, frame: &Frame) {
        trace!(
            "present frame item={} ts={}us",
            frame.attribute.index,
            frame.timestamp_us
        );
    }

    fn fusion_test(&self, image: &str, factor: f32) {
        debug!("fusion test image={} factor={}", image, factor);
    }
}

impl AudioSink for NullSink {
    fn play(&self, sample: &Sample) {
        trace!(
            "play sample item={} bytes={}",
            sample.attribute.index,
            sample.bytes.len()
        );
    }
}
