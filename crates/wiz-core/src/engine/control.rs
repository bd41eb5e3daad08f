//! Control operations
//!
//! Every operation follows the same sequence under the address lock:
//!
//! 1. Send the command to the bulb
//! 2. If the command fails, mark the bulb DOWN and return the stored record
//!    without refreshing
//! 3. If it succeeds, refresh the bulb and return the refreshed record

use std::fmt;

use tracing::{debug, warn};

use super::{BulbEvent, Reconciler};
use crate::error::{DeviceError, Error, Result};
use crate::model::BulbRecord;
use crate::scenes;

/// A command sent to a bulb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch on with a scene and brightness
    PowerOn { scene_id: u32, brightness: u8 },
    /// Switch off
    PowerOff,
    /// Switch to a scene, keeping the bulb's brightness
    SetScene { scene_id: u32 },
    /// Switch to a scene at a brightness
    SetDim { brightness: u8, scene_id: u32 },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PowerOn {
                scene_id,
                brightness,
            } => write!(f, "switch on (scene {}, brightness {})", scene_id, brightness),
            Command::PowerOff => write!(f, "switch off"),
            Command::SetScene { scene_id } => write!(f, "change to scene {}", scene_id),
            Command::SetDim {
                brightness,
                scene_id,
            } => write!(f, "dim to {} (scene {})", brightness, scene_id),
        }
    }
}

impl Reconciler {
    /// Switch a bulb on
    ///
    /// The bulb is switched on with its own last known scene and brightness;
    /// when it has never reported them, `control.default_scene_id` and
    /// `control.default_brightness` are used.
    pub async fn power_on(&self, address: &str) -> Result<BulbRecord> {
        let _guard = self.inner.locks.lock(address).await;

        let stored = self.inner.store.get_bulb(address).await?;
        let command = self.turn_on_command(stored.as_ref());
        self.execute_locked(address, command).await
    }

    /// Switch a bulb off
    pub async fn power_off(&self, address: &str) -> Result<BulbRecord> {
        self.execute(address, Command::PowerOff).await
    }

    /// Switch a bulb to a scene
    ///
    /// # Returns
    ///
    /// - `Err(Error::InvalidInput)`: `scene_id` is not a selectable WiZ scene;
    ///   neither the bulb nor the store is touched
    pub async fn set_scene(&self, address: &str, scene_id: u32) -> Result<BulbRecord> {
        ensure_selectable(scene_id)?;
        self.execute(address, Command::SetScene { scene_id }).await
    }

    /// Switch a bulb to a scene at the given brightness (0-255)
    ///
    /// # Returns
    ///
    /// - `Err(Error::InvalidInput)`: `scene_id` is not a selectable WiZ scene
    pub async fn set_dim(&self, address: &str, brightness: u8, scene_id: u32) -> Result<BulbRecord> {
        ensure_selectable(scene_id)?;
        self.execute(
            address,
            Command::SetDim {
                brightness,
                scene_id,
            },
        )
        .await
    }

    fn turn_on_command(&self, stored: Option<&BulbRecord>) -> Command {
        let defaults = &self.inner.control;
        let scene_id = stored
            .and_then(|record| record.scene_id)
            .filter(|id| scenes::is_selectable(*id))
            .unwrap_or(defaults.default_scene_id);
        let brightness = stored
            .and_then(|record| record.brightness)
            .unwrap_or(defaults.default_brightness);

        Command::PowerOn {
            scene_id,
            brightness,
        }
    }

    async fn execute(&self, address: &str, command: Command) -> Result<BulbRecord> {
        let _guard = self.inner.locks.lock(address).await;
        self.execute_locked(address, command).await
    }

    async fn execute_locked(&self, address: &str, command: Command) -> Result<BulbRecord> {
        match self.send(address, command).await {
            Ok(()) => {
                debug!("Sent {} to {}", command, address);
                self.emit_event(BulbEvent::CommandSucceeded {
                    address: address.to_string(),
                    command,
                });
                self.refresh_locked(address).await
            }
            Err(e) => {
                warn!("Cannot {} {}: {}", command, address, e);
                self.emit_event(BulbEvent::CommandFailed {
                    address: address.to_string(),
                    command,
                    kind: e.kind(),
                });
                self.mark_down(address, e.kind()).await?;
                self.current_record(address).await
            }
        }
    }

    async fn send(&self, address: &str, command: Command) -> std::result::Result<(), DeviceError> {
        let device = self.inner.connector.connect(address).await?;
        match command {
            Command::PowerOn {
                scene_id,
                brightness,
            } => device.apply_scene(scene_id, Some(brightness)).await,
            Command::PowerOff => device.power(false).await,
            Command::SetScene { scene_id } => device.apply_scene(scene_id, None).await,
            Command::SetDim {
                brightness,
                scene_id,
            } => device.apply_scene(scene_id, Some(brightness)).await,
        }
    }
}

fn ensure_selectable(scene_id: u32) -> Result<()> {
    if scenes::is_selectable(scene_id) {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "Unknown scene id {}",
            scene_id
        )))
    }
}
