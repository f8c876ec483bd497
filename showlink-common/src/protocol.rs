//! Request protocol
//!
//! A closed set of typed commands exchanged between nodes. Each request
//! carries only the data needed to execute it, is serialized as a
//! tagged object, transmitted once over a fresh connection, dispatched
//! exactly once per recipient, then discarded. The protocol layer never
//! retries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed command exchanged between cluster nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    /// Priming message sent before a synchronized broadcast; recipients
    /// discard it after deserialization
    WarmUp,
    /// Begin playback of the current flow
    Start,
    /// Abort playback and clear buffered media
    Stop,
    /// Suspend or resume consumption
    Pause { paused: bool },
    /// Redirect the next play position to the item with this index
    Select { index: u32 },
    /// Show a fusion alignment image at the given blend factor
    FusionTest { image: String, factor: f32 },
    /// Run the lighting rig's party program with this many lamps
    Party { lamps: u8 },
    /// Turn every light off
    LightsOut,
    /// Wake sleeping render nodes
    Wake,
    /// Reboot the receiving node's host
    Reboot,
    /// Shut the receiving node down
    Shutdown,
}

impl Request {
    /// Stable name of the request kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Request::WarmUp => "warm_up",
            Request::Start => "start",
            Request::Stop => "stop",
            Request::Pause { .. } => "pause",
            Request::Select { .. } => "select",
            Request::FusionTest { .. } => "fusion_test",
            Request::Party { .. } => "party",
            Request::LightsOut => "lights_out",
            Request::Wake => "wake",
            Request::Reboot => "reboot",
            Request::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_round_trip_as_tagged_json() {
        let requests = vec![
            Request::Start,
            Request::Pause { paused: true },
            Request::Select { index: 7 },
            Request::FusionTest {
                image: "grid.png".to_string(),
                factor: 0.5,
            },
            Request::Party { lamps: 4 },
        ];
        for request in requests {
            let json = serde_json::to_string(&request).unwrap();
            let back: Request = serde_json::from_str(&json).unwrap();
            assert_eq!(back, request);
        }
    }

    #[test]
    fn select_carries_its_index() {
        let json = serde_json::to_string(&Request::Select { index: 3 }).unwrap();
        assert!(json.contains("\"kind\":\"select\""));
        assert!(json.contains("\"index\":3"));
    }
}
