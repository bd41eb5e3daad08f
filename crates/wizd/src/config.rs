//! Environment configuration
//!
//! Every setting is optional except the store path when the file store is
//! selected; unset values fall back to the `WizConfig` defaults.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use wiz_core::{StoreConfig, WizConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store_type: String,
    pub store_path: Option<String>,
    pub device_port: Option<u16>,
    pub device_timeout_ms: Option<u64>,
    pub device_send_attempts: Option<u32>,
    pub discovery_range: Option<String>,
    pub discovery_wait_ms: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub max_concurrent_refreshes: Option<usize>,
    pub default_scene_id: Option<u32>,
    pub default_brightness: Option<u8>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            store_type: lookup("WIZ_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            store_path: lookup("WIZ_STORE_PATH"),
            device_port: parse_var(&lookup, "WIZ_DEVICE_PORT")?,
            device_timeout_ms: parse_var(&lookup, "WIZ_DEVICE_TIMEOUT_MS")?,
            device_send_attempts: parse_var(&lookup, "WIZ_DEVICE_SEND_ATTEMPTS")?,
            discovery_range: lookup("WIZ_DISCOVERY_RANGE"),
            discovery_wait_ms: parse_var(&lookup, "WIZ_DISCOVERY_WAIT_MS")?,
            poll_interval_secs: parse_var(&lookup, "WIZ_POLL_INTERVAL_SECS")?,
            max_concurrent_refreshes: parse_var(&lookup, "WIZ_MAX_CONCURRENT_REFRESHES")?,
            default_scene_id: parse_var(&lookup, "WIZ_DEFAULT_SCENE_ID")?,
            default_brightness: parse_var(&lookup, "WIZ_DEFAULT_BRIGHTNESS")?,
            log_level: lookup("WIZ_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks what only the daemon knows about (store type, store path, log
    /// level), then the resulting `WizConfig`.
    pub fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "WIZ_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" {
            match self.store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "WIZ_STORE_PATH is required when WIZ_STORE_TYPE=file. \
                    Set it via: export WIZ_STORE_PATH=/var/lib/wiz/bulbs.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "WIZ_STORE_PATH parent directory does not exist: {}. \
                            Create it first: mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            }
        }

        if let Some(interval) = self.poll_interval_secs
            && !(1..=86_400).contains(&interval)
        {
            anyhow::bail!(
                "WIZ_POLL_INTERVAL_SECS must be between 1 and 86400 seconds. Got: {}",
                interval
            );
        }

        if let Some(range) = &self.discovery_range {
            wiz_udp::AddressRange::parse(range)
                .with_context(|| format!("WIZ_DISCOVERY_RANGE '{}' is not valid", range))?;
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "WIZ_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_wiz_config().validate()?;
        Ok(())
    }

    /// Build the library configuration
    pub fn to_wiz_config(&self) -> WizConfig {
        let mut config = WizConfig::new();

        config.store = match self.store_type.as_str() {
            "file" => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
            _ => StoreConfig::Memory,
        };

        if let Some(port) = self.device_port {
            config.device.port = port;
        }
        if let Some(timeout_ms) = self.device_timeout_ms {
            config.device.timeout_ms = timeout_ms;
        }
        if let Some(attempts) = self.device_send_attempts {
            config.device.send_attempts = attempts;
        }
        if let Some(range) = &self.discovery_range {
            config.discovery.default_range = range.clone();
        }
        if let Some(wait_ms) = self.discovery_wait_ms {
            config.discovery.wait_ms = wait_ms;
        }
        if let Some(interval) = self.poll_interval_secs {
            config.engine.poll_interval_secs = interval;
        }
        if let Some(max) = self.max_concurrent_refreshes {
            config.engine.max_concurrent_refreshes = max;
        }
        if let Some(scene_id) = self.default_scene_id {
            config.control.default_scene_id = scene_id;
        }
        if let Some(brightness) = self.default_brightness {
            config.control.default_brightness = brightness;
        }

        config
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|v| {
            v.trim()
                .parse()
                .with_context(|| format!("{} has an invalid value: '{}'", name, v))
        })
        .transpose()
}
