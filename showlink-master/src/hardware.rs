//! Hardware capability seams
//!
//! The lighting/motion rig and the node power controls are vendor
//! hardware behind opaque drivers. The core only needs this small
//! capability set; each call may block for seconds and may fault, and a
//! fault is fatal to the current step only, never to the process.

use async_trait::async_trait;
use showlink_common::node::NodeInformation;
use showlink_common::Result;
use tracing::info;

/// Lighting program selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    /// Scene program keyed to a media item index
    Scene(u32),
    /// Party chase across the given lamp count
    Party(u8),
    Off,
}

/// Lighting and motion rig capability
#[async_trait]
pub trait HardwareIo: Send + Sync {
    /// Bring the rig to its known starting state
    async fn initialize_rig(&self) -> Result<()>;

    /// Fire the trigger for one schedule step
    async fn trigger(&self, mode: LightMode) -> Result<()>;

    /// Run the party program with this many lamps
    async fn party_mode(&self, lamps: u8) -> Result<()>;

    /// Turn every light off
    async fn all_off(&self) -> Result<()>;
}

/// Node power capability (wake-on-LAN and friends live outside the
/// core)
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn wake(&self, node: &NodeInformation) -> Result<()>;
}

/// Rig stand-in that logs every call, for running without hardware
#[derive(Default)]
pub struct LoggingHardware;

#[async_trait]
impl HardwareIo for LoggingHardware {
    async fn initialize_rig(&self) -> Result<()> {
        info!("rig: initialize");
        Ok(())
    }

    async fn trigger(&self, mode: LightMode) -> Result<()> {
        info!("rig: trigger {:?}", mode);
        Ok(())
    }

    async fn party_mode(&self, lamps: u8) -> Result<()> {
        info!("rig: party mode with {} lamps", lamps);
        Ok(())
    }

    async fn all_off(&self) -> Result<()> {
        info!("rig: all off");
        Ok(())
    }
}

#[async_trait]
impl PowerControl for LoggingHardware {
    async fn wake(&self, node: &NodeInformation) -> Result<()> {
        info!("power: wake {} ({})", node.key(), node.mac);
        Ok(())
    }
}
