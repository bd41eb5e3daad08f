// # Device Client Traits
//
// Defines the interface for talking to a single bulb.
//
// ## Implementations
//
// - UDP (WiZ JSON protocol, port 38899): `wiz-udp` crate
// - Test doubles: `tests/common/mod.rs`
//
// ## Usage
//
// ```rust,ignore
// use wiz_core::traits::{DeviceConnector, BulbDevice};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let connector = /* DeviceConnector implementation */;
//
//     let bulb = connector.connect("192.168.1.20").await?;
//     let status = bulb.query_status().await?;
//     bulb.apply_scene(11, Some(255)).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DeviceError;

/// Status payload exactly as the bulb reported it
///
/// No field is guaranteed to be present; see [`crate::normalizer`] for the
/// mapping into [`crate::BulbState`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatus(Value);

impl RawStatus {
    /// Wrap a bulb's status object
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// A connection to one bulb
///
/// Every call is a single round trip and must return or fail within the
/// implementation's per-call timeout. Implementations must not retry at the
/// engine level, touch the bulb store, or spawn tasks.
#[async_trait]
pub trait BulbDevice: Send + Sync {
    /// Address this connection talks to
    fn address(&self) -> &str;

    /// Request the bulb's current status
    ///
    /// # Returns
    ///
    /// - `Ok(RawStatus)`: The status object, possibly partial
    /// - `Err(DeviceError)`: Timeout, transport or protocol failure
    async fn query_status(&self) -> Result<RawStatus, DeviceError>;

    /// Switch the bulb on or off without changing its scene
    async fn power(&self, on: bool) -> Result<(), DeviceError>;

    /// Switch the bulb on with the given scene
    ///
    /// # Parameters
    ///
    /// - `scene_id`: Scene to activate
    /// - `brightness`: Brightness on a 0-255 scale; `None` keeps the bulb's own
    async fn apply_scene(&self, scene_id: u32, brightness: Option<u8>)
    -> Result<(), DeviceError>;
}

/// Opens [`BulbDevice`] connections by address
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Open a connection to the bulb at `address`
    ///
    /// Failing to resolve or bind is reported as a transport failure.
    async fn connect(&self, address: &str) -> Result<Box<dyn BulbDevice>, DeviceError>;
}
