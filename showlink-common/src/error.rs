//! Error types for showlink
//!
//! Defines the system-wide error type using thiserror for clear error
//! propagation across the cluster roles.

use thiserror::Error;

/// Main error type shared by all showlink crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Wire transport errors (connect, framing, fan-out)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Fan-out or poll exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Cluster buffers are not ready for a synchronized start
    #[error("Cluster not ready: {0}")]
    NotReady(String),

    /// Play order construction or traversal errors
    #[error("Play order error: {0}")]
    PlayOrder(String),

    /// Playback engine errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Hardware rig faults (lighting, motion)
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Message (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File and socket I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the showlink Error
pub type Result<T> = std::result::Result<T, Error>;
