//! # Showlink Common Library
//!
//! Shared code for all showlink cluster roles including:
//! - Cluster configuration loading
//! - Node identity and addressing
//! - Media data model (attributes, frames, samples)
//! - Buffer metrics snapshots
//! - Play order / play flow state machine
//! - Request protocol and wire codec
//! - Drift-corrected playback sleeper

pub mod config;
pub mod error;
pub mod media;
pub mod metrics;
pub mod node;
pub mod playorder;
pub mod protocol;
pub mod timing;
pub mod wire;

pub use error::{Error, Result};
