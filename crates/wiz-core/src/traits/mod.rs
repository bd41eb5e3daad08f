//! Core traits for the WiZ control system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DeviceConnector`] / [`BulbDevice`]: Talk to one bulb
//! - [`BulbDiscovery`]: Enumerate bulbs on the network
//! - [`BulbStore`]: Persistent bulb records

pub mod bulb_store;
pub mod device;
pub mod discovery;

pub use bulb_store::BulbStore;
pub use device::{BulbDevice, DeviceConnector, RawStatus};
pub use discovery::BulbDiscovery;
