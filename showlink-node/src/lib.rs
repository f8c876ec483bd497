//! # Showlink Render Node (showlink-node)
//!
//! Video/fusion renderer node for a showlink cluster.
//!
//! **Purpose:** Buffer decoded media with backpressure, render frames
//! against a drift-corrected clock, serve buffer metrics on the
//! heartbeat port, and execute typed commands from the master.
//!
//! **Architecture:** One producer task drains the decode collaborator
//! into the `MediaBuffer`; one render task and one audio task consume
//! it; one accept loop feeds a single command dispatcher.

pub mod buffer;
pub mod command;
pub mod engine;
pub mod heartbeat;
pub mod sink;
pub mod source;

pub use showlink_common::{Error, Result};
