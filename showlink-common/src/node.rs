//! Cluster node identity
//!
//! Each cluster member is identified by its role, network address and
//! hardware MAC, and exposes two listening ports: a command port that
//! receives one `Request` per connection, and a heartbeat port that
//! serves one `BufferMetrics` snapshot per connection.
//!
//! `NodeInformation` is totally ordered by (role, address, MAC) so that
//! fan-out operations always iterate the cluster in the same order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a node plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Control,
    Video,
    Fusion,
    Projector,
}

impl NodeRole {
    /// Whether this role renders media and therefore reports buffer metrics
    pub fn is_renderer(self) -> bool {
        matches!(self, NodeRole::Video | NodeRole::Fusion)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Master => "master",
            NodeRole::Control => "control",
            NodeRole::Video => "video",
            NodeRole::Fusion => "fusion",
            NodeRole::Projector => "projector",
        };
        write!(f, "{}", name)
    }
}

/// Identity of one cluster member
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeInformation {
    pub role: NodeRole,
    pub address: String,
    pub mac: String,
    pub command_port: u16,
    pub heartbeat_port: u16,
}

impl NodeInformation {
    /// Socket address of the node's command listener
    pub fn command_addr(&self) -> String {
        format!("{}:{}", self.address, self.command_port)
    }

    /// Socket address of the node's heartbeat listener
    pub fn heartbeat_addr(&self) -> String {
        format!("{}:{}", self.address, self.heartbeat_port)
    }

    /// Stable key for snapshot maps and logs
    pub fn key(&self) -> String {
        format!("{}@{}", self.role, self.command_addr())
    }
}

impl PartialOrd for NodeInformation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeInformation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.role, &self.address, &self.mac).cmp(&(other.role, &other.address, &other.mac))
    }
}

impl fmt::Display for NodeInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(role: NodeRole, address: &str, mac: &str) -> NodeInformation {
        NodeInformation {
            role,
            address: address.to_string(),
            mac: mac.to_string(),
            command_port: 7400,
            heartbeat_port: 7401,
        }
    }

    #[test]
    fn ordering_is_role_then_address_then_mac() {
        let mut nodes = vec![
            node(NodeRole::Video, "10.0.0.3", "cc"),
            node(NodeRole::Master, "10.0.0.1", "aa"),
            node(NodeRole::Video, "10.0.0.2", "bb"),
            node(NodeRole::Fusion, "10.0.0.4", "dd"),
        ];
        nodes.sort();
        let roles: Vec<NodeRole> = nodes.iter().map(|n| n.role).collect();
        assert_eq!(
            roles,
            vec![NodeRole::Master, NodeRole::Video, NodeRole::Video, NodeRole::Fusion]
        );
        assert_eq!(nodes[1].address, "10.0.0.2");
        assert_eq!(nodes[2].address, "10.0.0.3");
    }

    #[test]
    fn renderer_roles() {
        assert!(NodeRole::Video.is_renderer());
        assert!(NodeRole::Fusion.is_renderer());
        assert!(!NodeRole::Master.is_renderer());
        assert!(!NodeRole::Control.is_renderer());
    }
}
