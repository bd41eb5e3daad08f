// # wiz-core
//
// Core library for discovering, controlling and tracking WiZ bulbs.
//
// ## Architecture Overview
//
// - **DeviceConnector / BulbDevice**: Traits for talking to one bulb
// - **BulbDiscovery**: Trait for enumerating bulbs on the network
// - **BulbStore**: Trait for persistent bulb records
// - **Reconciler**: Engine that refreshes bulbs, runs control commands and
//   scans, reconciling every outcome against the store
// - **normalizer**: Raw bulb status → canonical `BulbState`
//
// ## Design Principles
//
// 1. **Per-device isolation**: One unreachable bulb never fails its siblings
// 2. **DOWN is state, not an error**: Device failures become records
// 3. **Store failures propagate**: There is no fallback for lost storage
// 4. **Library-first**: The daemon is a thin layer over this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalizer;
pub mod scenes;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ControlConfig, DeviceConfig, DiscoveryConfig, EngineConfig, StoreConfig, WizConfig};
pub use engine::{BulbEvent, Command, Reconciler};
pub use error::{DeviceError, Error, FailureKind, Result};
pub use model::{BulbRecord, BulbState, Reachability};
pub use state::{FileBulbStore, MemoryBulbStore};
pub use traits::{BulbDevice, BulbDiscovery, BulbStore, DeviceConnector, RawStatus};
