//! # Showlink Master (showlink-master)
//!
//! Master node for a showlink cluster.
//!
//! **Purpose:** Gate the synchronized START broadcast on cluster-wide
//! buffer readiness, fan commands out to the render nodes with a
//! warm-up barrier, poll every renderer's buffer metrics, and drive the
//! wall-clock schedule of hardware triggers along the play order.

pub mod command;
pub mod hardware;
pub mod sequencer;
pub mod transport;
pub mod watcher;

pub use showlink_common::{Error, Result};
