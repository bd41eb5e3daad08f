// # Memory Bulb Store
//
// In-memory implementation of BulbStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for one-shot CLI runs where the bulb list is
// rebuilt by a scan every time.
//
// ## Crash Behavior
//
// - All records are lost on restart/crash
// - The next scan re-registers every bulb that answers

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::BulbTable;
use crate::Error;
use crate::model::{BulbRecord, BulbState};
use crate::traits::BulbStore;

/// In-memory bulb store
///
/// Records live in a `BulbTable` protected by a RwLock.
///
/// # Example
///
/// ```rust,no_run
/// use wiz_core::state::MemoryBulbStore;
/// use wiz_core::traits::BulbStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryBulbStore::new();
///
///     store.add_bulb("192.168.1.20").await?;
///
///     let bulb = store.get_bulb("192.168.1.20").await?;
///     assert!(bulb.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBulbStore {
    inner: Arc<RwLock<BulbTable>>,
}

impl MemoryBulbStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.len() == 0
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl BulbStore for MemoryBulbStore {
    async fn get_bulb(&self, address: &str) -> Result<Option<BulbRecord>, Error> {
        Ok(self.inner.read().await.get(address).cloned())
    }

    async fn get_all_bulbs(&self) -> Result<Vec<BulbRecord>, Error> {
        Ok(self.inner.read().await.all())
    }

    async fn add_bulb(&self, address: &str) -> Result<bool, Error> {
        Ok(self.inner.write().await.add(address))
    }

    async fn update_bulb_state(&self, address: &str, state: BulbState) -> Result<(), Error> {
        self.inner.write().await.update_state(address, state);
        Ok(())
    }

    async fn update_bulb_down(&self, address: &str) -> Result<(), Error> {
        self.inner.write().await.update_down(address);
        Ok(())
    }

    async fn rename_bulb(&self, address: &str, name: &str) -> Result<bool, Error> {
        Ok(self.inner.write().await.rename(address, name))
    }

    async fn delete_bulb(&self, address: &str) -> Result<bool, Error> {
        Ok(self.inner.write().await.delete(address))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reachability;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryBulbStore::new();

        assert!(store.is_empty().await);

        assert!(store.add_bulb("10.0.0.5").await.unwrap());
        assert_eq!(store.len().await, 1);

        let bulb = store.get_bulb("10.0.0.5").await.unwrap().unwrap();
        assert_eq!(bulb.reachable, Reachability::Down);

        assert!(store.delete_bulb("10.0.0.5").await.unwrap());
        assert!(!store.delete_bulb("10.0.0.5").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let store = MemoryBulbStore::new();

        assert!(store.add_bulb("10.0.0.5").await.unwrap());
        store
            .update_bulb_state(
                "10.0.0.5",
                BulbState {
                    power_state: Some(true),
                    ..BulbState::default()
                },
            )
            .await
            .unwrap();

        assert!(!store.add_bulb("10.0.0.5").await.unwrap());
        assert_eq!(store.len().await, 1);

        // Re-registering must not reset known state
        let bulb = store.get_bulb("10.0.0.5").await.unwrap().unwrap();
        assert_eq!(bulb.power_state, Some(true));
        assert_eq!(bulb.reachable, Reachability::Up);
    }

    #[tokio::test]
    async fn test_registration_order_preserved() {
        let store = MemoryBulbStore::new();
        for address in ["10.0.0.9", "10.0.0.1", "10.0.0.5"] {
            store.add_bulb(address).await.unwrap();
        }

        let addresses: Vec<String> = store
            .get_all_bulbs()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.address)
            .collect();
        assert_eq!(addresses, vec!["10.0.0.9", "10.0.0.1", "10.0.0.5"]);
    }

    #[tokio::test]
    async fn test_down_keeps_state() {
        let store = MemoryBulbStore::new();
        store.add_bulb("10.0.0.5").await.unwrap();
        let state = BulbState {
            power_state: Some(true),
            scene_id: Some(4),
            scene_name: Some("Party".to_string()),
            brightness: Some(200),
        };
        store.update_bulb_state("10.0.0.5", state.clone()).await.unwrap();
        store.update_bulb_down("10.0.0.5").await.unwrap();

        let bulb = store.get_bulb("10.0.0.5").await.unwrap().unwrap();
        assert_eq!(bulb.reachable, Reachability::Down);
        assert_eq!(bulb.state(), state);
        assert!(bulb.last_seen.is_some());
    }

    #[tokio::test]
    async fn test_updates_to_unknown_address_are_noops() {
        let store = MemoryBulbStore::new();
        store.update_bulb_down("10.0.0.5").await.unwrap();
        store
            .update_bulb_state("10.0.0.5", BulbState::default())
            .await
            .unwrap();
        assert!(!store.rename_bulb("10.0.0.5", "Hall").await.unwrap());
        assert!(store.is_empty().await);
    }
}
