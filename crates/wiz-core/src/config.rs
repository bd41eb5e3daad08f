//! Configuration types for the WiZ control system
//!
//! This module defines all configuration structures used throughout the crate.
//! Every value is fixed at startup; nothing here is mutated by control calls.

use serde::{Deserialize, Serialize};

use crate::scenes;

/// UDP port WiZ bulbs listen on
pub const WIZ_PORT: u16 = 38899;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WizConfig {
    /// Per-device transport settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Bulb store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Defaults for control operations
    #[serde(default)]
    pub control: ControlConfig,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl WizConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.device.validate()?;
        self.discovery.validate()?;
        self.store.validate()?;
        self.control.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Device transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// UDP port bulbs listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for one device call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How many times a datagram is sent within the timeout
    ///
    /// UDP requests can be lost; the request is resent at even intervals
    /// until a reply arrives or the timeout elapses.
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,
}

impl DeviceConfig {
    /// Validate the device configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.port == 0 {
            return Err(crate::Error::config("Device port must be > 0"));
        }
        if self.timeout_ms == 0 {
            return Err(crate::Error::config("Device timeout must be > 0"));
        }
        if self.send_attempts == 0 {
            return Err(crate::Error::config("Device send attempts must be > 0"));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            send_attempts: default_send_attempts(),
        }
    }
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Range scanned when the caller does not give one
    ///
    /// Empty means the limited broadcast address.
    #[serde(default)]
    pub default_range: String,

    /// How long to collect discovery replies, in milliseconds
    #[serde(default = "default_discovery_wait_ms")]
    pub wait_ms: u64,
}

impl DiscoveryConfig {
    /// Validate the discovery configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.wait_ms == 0 {
            return Err(crate::Error::config("Discovery wait must be > 0"));
        }
        Ok(())
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_range: String::new(),
            wait_ms: default_discovery_wait_ms(),
        }
    }
}

/// Bulb store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Defaults applied by control operations
///
/// `power_on` uses the bulb's own last known scene and brightness and falls
/// back to these when the bulb has never reported one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Scene used when a bulb has no known scene
    #[serde(default = "default_scene_id")]
    pub default_scene_id: u32,

    /// Brightness (0-255) used when a bulb has no known brightness
    #[serde(default = "default_brightness")]
    pub default_brightness: u8,
}

impl ControlConfig {
    /// Validate the control configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !scenes::is_selectable(self.default_scene_id) {
            return Err(crate::Error::config(format!(
                "Default scene {} is not a selectable WiZ scene",
                self.default_scene_id
            )));
        }
        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            default_scene_id: default_scene_id(),
            default_brightness: default_brightness(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of bulbs refreshed at the same time
    #[serde(default = "default_max_concurrent_refreshes")]
    pub max_concurrent_refreshes: usize,

    /// Interval between refresh passes of the poll loop (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_concurrent_refreshes == 0 {
            return Err(crate::Error::config(
                "Maximum concurrent refreshes must be > 0",
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_refreshes: default_max_concurrent_refreshes(),
            poll_interval_secs: default_poll_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_port() -> u16 {
    WIZ_PORT
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_send_attempts() -> u32 {
    3
}

fn default_discovery_wait_ms() -> u64 {
    3000
}

fn default_scene_id() -> u32 {
    11
}

fn default_brightness() -> u8 {
    255
}

fn default_max_concurrent_refreshes() -> usize {
    16
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
