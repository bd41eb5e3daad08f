//! Bulb records
//!
//! [`BulbRecord`] is the persisted entity: one per registered address.
//! [`BulbState`] is the projection a successful status query produces and the
//! only thing a refresh is allowed to overwrite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the bulb answered its most recent refresh or command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Up,
    Down,
}

impl Reachability {
    pub fn is_up(self) -> bool {
        self == Reachability::Up
    }
}

/// Normalized state of a bulb, as reported by the bulb itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulbState {
    /// `Some(true)` when lit; `None` when the bulb did not say
    pub power_state: Option<bool>,
    /// Active scene identifier
    pub scene_id: Option<u32>,
    /// Human-readable scene name
    pub scene_name: Option<String>,
    /// Brightness on a 0-255 scale
    pub brightness: Option<u8>,
}

/// Persisted record of a registered bulb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulbRecord {
    /// Network address, the unique key
    pub address: String,
    /// Display name (defaults to the address)
    pub name: String,
    /// Outcome of the last refresh or command
    pub reachable: Reachability,
    pub power_state: Option<bool>,
    pub scene_id: Option<u32>,
    pub scene_name: Option<String>,
    pub brightness: Option<u8>,
    /// Time of the last successful refresh
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl BulbRecord {
    /// A freshly registered bulb: DOWN, no known state
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
            reachable: Reachability::Down,
            power_state: None,
            scene_id: None,
            scene_name: None,
            brightness: None,
            last_seen: None,
        }
    }

    /// Overwrite the state fields and mark the bulb UP
    pub fn apply_state(&mut self, state: BulbState) {
        self.reachable = Reachability::Up;
        self.power_state = state.power_state;
        self.scene_id = state.scene_id;
        self.scene_name = state.scene_name;
        self.brightness = state.brightness;
        self.last_seen = Some(Utc::now());
    }

    /// Mark the bulb DOWN, keeping the last known state
    pub fn mark_down(&mut self) {
        self.reachable = Reachability::Down;
    }

    /// The state fields of this record
    pub fn state(&self) -> BulbState {
        BulbState {
            power_state: self.power_state,
            scene_id: self.scene_id,
            scene_name: self.scene_name.clone(),
            brightness: self.brightness,
        }
    }
}
