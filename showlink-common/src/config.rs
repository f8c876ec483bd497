//! Cluster configuration loading
//!
//! One TOML file describes the whole cluster: membership, buffer
//! limits, heartbeat cadence, the media list with its default play
//! order, the branch table for live selection, and per-step schedule
//! cuts. The file path is resolved in priority order: command-line
//! argument, then the `SHOWLINK_CONFIG` environment variable, then the
//! system default path.

use crate::media::MediaAttribute;
use crate::node::{NodeInformation, NodeRole};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SHOWLINK_CONFIG";

/// System-wide default config path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/showlink/cluster.toml";

fn default_frame_capacity() -> usize {
    100
}

fn default_lower_limit() -> f64 {
    0.9
}

/// Media buffer sizing and the readiness threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Bounded frame queue capacity per renderer
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,
    /// Frame fill ratio at or below which a node counts as
    /// under-buffered
    #[serde(default = "default_lower_limit")]
    pub lower_limit: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            frame_capacity: default_frame_capacity(),
            lower_limit: default_lower_limit(),
        }
    }
}

fn default_poll_period_ms() -> u64 {
    500
}

fn default_poll_timeout_ms() -> u64 {
    300
}

/// Heartbeat polling cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
    /// Per-node round-trip budget for one poll
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: default_poll_period_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

fn default_send_timeout_ms() -> u64 {
    1_000
}

fn default_fanout_timeout_ms() -> u64 {
    3_000
}

/// Transport deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Deadline for one point-to-point send
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Deadline for a whole warm-up fan-out including the barrier wait
    #[serde(default = "default_fanout_timeout_ms")]
    pub fanout_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
            fanout_timeout_ms: default_fanout_timeout_ms(),
        }
    }
}

fn default_pace_tolerance_us() -> u64 {
    crate::timing::DEFAULT_TOLERANCE_US
}

/// Default traversal and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Default play order as media indices
    pub default_order: Vec<u32>,
    #[serde(default = "default_pace_tolerance_us")]
    pub pace_tolerance_us: u64,
}

/// One live-selectable branch point
///
/// While the item with index `at` plays, the operator may select either
/// `left` or `right` as the next item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Branch {
    pub at: u32,
    pub left: u32,
    pub right: u32,
}

/// Venue-specific reduction of one schedule step's sleep
///
/// The original show carried a hard-coded "cut time" for one step of
/// one venue's rig; it is configuration here, not protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduleCut {
    /// Play position the cut applies to
    pub position: usize,
    pub reduce_us: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub cuts: Vec<ScheduleCut>,
}

impl ScheduleConfig {
    /// Microseconds to shave off the sleep at `position`
    pub fn cut_for(&self, position: usize) -> u64 {
        self.cuts
            .iter()
            .find(|cut| cut.position == position)
            .map(|cut| cut.reduce_us)
            .unwrap_or(0)
    }
}

/// Whole-cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeInformation>,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    pub media: Vec<MediaAttribute>,
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl ClusterConfig {
    /// Parse and validate a config document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClusterConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Config("node list is empty".to_string()));
        }
        let masters = self
            .nodes
            .iter()
            .filter(|n| n.role == NodeRole::Master)
            .count();
        if masters != 1 {
            return Err(Error::Config(format!(
                "expected exactly one master node, found {}",
                masters
            )));
        }
        if self.media.is_empty() {
            return Err(Error::Config("media list is empty".to_string()));
        }
        let indices: HashSet<u32> = self.media.iter().map(|m| m.index).collect();
        if indices.len() != self.media.len() {
            return Err(Error::Config("duplicate media index".to_string()));
        }
        if self.playback.default_order.is_empty() {
            return Err(Error::Config("default play order is empty".to_string()));
        }
        for index in &self.playback.default_order {
            if !indices.contains(index) {
                return Err(Error::Config(format!(
                    "default order references unknown media index {}",
                    index
                )));
            }
        }
        for branch in &self.branches {
            for index in [branch.at, branch.left, branch.right] {
                if !indices.contains(&index) {
                    return Err(Error::Config(format!(
                        "branch references unknown media index {}",
                        index
                    )));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.buffer.lower_limit) {
            return Err(Error::Config(format!(
                "buffer lower limit {} outside 0.0..=1.0",
                self.buffer.lower_limit
            )));
        }
        if self.buffer.frame_capacity == 0 {
            return Err(Error::Config("frame capacity must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Renderer nodes in deterministic fan-out order
    pub fn renderers(&self) -> Vec<NodeInformation> {
        let mut nodes: Vec<NodeInformation> = self
            .nodes
            .iter()
            .filter(|n| n.role.is_renderer())
            .cloned()
            .collect();
        nodes.sort();
        nodes
    }

    /// The single master node
    pub fn master(&self) -> &NodeInformation {
        // Validated at load: exactly one master exists
        self.nodes
            .iter()
            .find(|n| n.role == NodeRole::Master)
            .unwrap()
    }

    /// Find a node by its command address
    pub fn node_by_key(&self, key: &str) -> Option<&NodeInformation> {
        self.nodes.iter().find(|n| n.key() == key)
    }

    /// Whether `index` is offered by any branch point
    pub fn is_selectable(&self, index: u32) -> bool {
        self.branches
            .iter()
            .any(|b| b.left == index || b.right == index)
    }
}

/// Resolve the config file path: CLI argument, then environment, then
/// the system default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [[nodes]]
        role = "master"
        address = "10.0.0.1"
        mac = "aa:bb:cc:00:00:01"
        command_port = 7400
        heartbeat_port = 7401

        [[nodes]]
        role = "video"
        address = "10.0.0.2"
        mac = "aa:bb:cc:00:00:02"
        command_port = 7400
        heartbeat_port = 7401

        [[nodes]]
        role = "fusion"
        address = "10.0.0.3"
        mac = "aa:bb:cc:00:00:03"
        command_port = 7400
        heartbeat_port = 7401

        [buffer]
        frame_capacity = 100
        lower_limit = 0.9

        [[media]]
        index = 0
        source = "act1.mov"
        duration_us = 120000000

        [media.audio_format]
        sample_rate = 48000
        channels = 2
        bits_per_sample = 16

        [[media]]
        index = 1
        source = "act2.mov"
        duration_us = 90000000

        [media.audio_format]
        sample_rate = 48000
        channels = 2
        bits_per_sample = 16

        [playback]
        default_order = [0, 1]

        [[branches]]
        at = 0
        left = 0
        right = 1

        [[schedule.cuts]]
        position = 1
        reduce_us = 1500000
    "#;

    #[test]
    fn sample_config_parses() {
        let config = ClusterConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.renderers().len(), 2);
        assert_eq!(config.master().address, "10.0.0.1");
        assert_eq!(config.buffer.frame_capacity, 100);
        assert_eq!(config.schedule.cut_for(1), 1_500_000);
        assert_eq!(config.schedule.cut_for(0), 0);
        assert!(config.is_selectable(1));
        assert!(!config.is_selectable(99));
    }

    #[test]
    fn renderers_come_back_in_fanout_order() {
        let config = ClusterConfig::from_toml(SAMPLE).unwrap();
        let renderers = config.renderers();
        // Video sorts before fusion per the role ordering
        assert_eq!(renderers[0].address, "10.0.0.2");
        assert_eq!(renderers[1].address, "10.0.0.3");
    }

    #[test]
    fn order_referencing_unknown_media_is_rejected() {
        let broken = SAMPLE.replace("default_order = [0, 1]", "default_order = [0, 9]");
        assert!(ClusterConfig::from_toml(&broken).is_err());
    }

    #[test]
    fn missing_master_is_rejected() {
        let broken = SAMPLE.replace("role = \"master\"", "role = \"video\"");
        assert!(ClusterConfig::from_toml(&broken).is_err());
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ClusterConfig::load(file.path()).unwrap();
        assert_eq!(config.media.len(), 2);
    }
}
