//! Decode collaborator seam
//!
//! The native decoder is a black box to the coordination layer: it is
//! opened per media item and yields timestamped frames and samples
//! until it reports `MediaUnit::End`. The `SyntheticSource` stands in
//! for the real decoder during bring-up and in tests, emitting blank
//! frames on the item's nominal frame grid.

use async_trait::async_trait;
use showlink_common::media::{Frame, MediaAttribute, MediaUnit, Sample};
use showlink_common::Result;
use std::sync::Arc;

/// One opened media stream
#[async_trait]
pub trait MediaSource: Send {
    /// Attribute probed at open time
    fn attribute(&self) -> &MediaAttribute;

    /// Next decoded unit; `MediaUnit::End` signals completion
    async fn next_unit(&mut self) -> Result<MediaUnit>;
}

/// Opens media streams; one per registered media item
pub trait MediaOpener: Send + Sync {
    fn open(&self, attribute: &MediaAttribute) -> Result<Box<dyn MediaSource>>;
}

/// Frame cadence of the synthetic stream
const SYNTHETIC_FRAME_INTERVAL_US: u64 = 40_000; // 25 fps
const SYNTHETIC_SAMPLE_INTERVAL_US: u64 = 20_000;
const SYNTHETIC_FRAME_BYTES: usize = 64;
const SYNTHETIC_SAMPLE_BYTES: usize = 32;

/// Stand-in decoder emitting blank timestamped units
pub struct SyntheticSource {
    attribute: Arc<MediaAttribute>,
    next_frame_us: u64,
    next_sample_us: u64,
}

impl SyntheticSource {
    pub fn new(attribute: MediaAttribute) -> Self {
        Self {
            attribute: Arc::new(attribute),
            next_frame_us: 0,
            next_sample_us: 0,
        }
    }
}

#[async_trait]
impl MediaSource for SyntheticSource {
    fn attribute(&self) -> &MediaAttribute {
        &self.attribute
    }

    async fn next_unit(&mut self) -> Result<MediaUnit> {
        let duration = self.attribute.duration_us;
        if self.next_frame_us >= duration && self.next_sample_us >= duration {
            return Ok(MediaUnit::End);
        }
        // Interleave in timestamp order, samples first on ties
        if self.next_sample_us <= self.next_frame_us && self.next_sample_us < duration {
            let sample = Sample {
                attribute: Arc::clone(&self.attribute),
                bytes: vec![0u8; SYNTHETIC_SAMPLE_BYTES],
            };
            self.next_sample_us += SYNTHETIC_SAMPLE_INTERVAL_US;
            return Ok(MediaUnit::Audio(sample));
        }
        let frame = Frame {
            attribute: Arc::clone(&self.attribute),
            timestamp_us: self.next_frame_us,
            image: vec![0u8; SYNTHETIC_FRAME_BYTES],
        };
        self.next_frame_us += SYNTHETIC_FRAME_INTERVAL_US;
        Ok(MediaUnit::Video(frame))
    }
}

/// Opener producing synthetic streams
#[derive(Default)]
pub struct SyntheticOpener;

impl MediaOpener for SyntheticOpener {
    fn open(&self, attribute: &MediaAttribute) -> Result<Box<dyn MediaSource>> {
        Ok(Box::new(SyntheticSource::new(attribute.clone())))
    }
}
