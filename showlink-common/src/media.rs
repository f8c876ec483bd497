//! Media data model
//!
//! Decoded media units flow from the decode collaborator into a node's
//! `MediaBuffer`, owned exclusively by the buffer until consumed by
//! exactly one reader. End-of-stream is an explicit variant of
//! `MediaUnit`, never an error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Audio format reported by the decoder at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            bits_per_sample: 16,
        }
    }
}

/// Immutable description of one playable item
///
/// Cloned (deep-copied) when registered into a `PlayOrder` so later
/// decoder-side mutation can never reach a flow already handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttribute {
    /// Stable identity within the media list
    pub index: u32,
    /// Source the decoder opened (path or URI)
    pub source: PathBuf,
    /// Nominal duration in microseconds
    pub duration_us: u64,
    pub audio_format: AudioFormat,
}

/// One decoded video frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub attribute: Arc<MediaAttribute>,
    /// Stream timestamp in microseconds
    pub timestamp_us: u64,
    /// Decoded pixel data (opaque to the coordination layer)
    pub image: Vec<u8>,
}

impl Frame {
    /// Approximate heap weight used for buffer accounting
    pub fn heap_size(&self) -> u64 {
        self.image.len() as u64
    }
}

/// One decoded audio chunk
#[derive(Debug, Clone)]
pub struct Sample {
    pub attribute: Arc<MediaAttribute>,
    pub bytes: Vec<u8>,
}

impl Sample {
    pub fn heap_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// One unit read from the decode collaborator
#[derive(Debug, Clone)]
pub enum MediaUnit {
    Video(Frame),
    Audio(Sample),
    /// Stream complete; no payload follows
    End,
}
