// # Bulb Store Implementations
//
// This module provides implementations of the BulbStore trait for
// different persistence strategies. Both keep their records in a
// `BulbTable`, which owns the update rules.

pub mod file;
pub mod memory;

pub use file::FileBulbStore;
pub use memory::MemoryBulbStore;

use serde::{Deserialize, Serialize};

use crate::model::{BulbRecord, BulbState};

/// Ordered set of bulb records keyed by address
///
/// Registration order is preserved; device sets are small, so lookups are
/// linear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct BulbTable {
    bulbs: Vec<BulbRecord>,
}

impl BulbTable {
    pub(crate) fn len(&self) -> usize {
        self.bulbs.len()
    }

    pub(crate) fn get(&self, address: &str) -> Option<&BulbRecord> {
        self.bulbs.iter().find(|b| b.address == address)
    }

    fn get_mut(&mut self, address: &str) -> Option<&mut BulbRecord> {
        self.bulbs.iter_mut().find(|b| b.address == address)
    }

    pub(crate) fn all(&self) -> Vec<BulbRecord> {
        self.bulbs.clone()
    }

    /// Returns `true` if a record was created
    pub(crate) fn add(&mut self, address: &str) -> bool {
        if self.get(address).is_some() {
            return false;
        }
        self.bulbs.push(BulbRecord::new(address));
        true
    }

    /// Returns `true` if the address was registered
    pub(crate) fn update_state(&mut self, address: &str, state: BulbState) -> bool {
        match self.get_mut(address) {
            Some(record) => {
                record.apply_state(state);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the address was registered
    pub(crate) fn update_down(&mut self, address: &str) -> bool {
        match self.get_mut(address) {
            Some(record) => {
                record.mark_down();
                true
            }
            None => false,
        }
    }

    pub(crate) fn rename(&mut self, address: &str, name: &str) -> bool {
        match self.get_mut(address) {
            Some(record) => {
                record.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub(crate) fn delete(&mut self, address: &str) -> bool {
        let before = self.bulbs.len();
        self.bulbs.retain(|b| b.address != address);
        self.bulbs.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.bulbs.clear();
    }
}
