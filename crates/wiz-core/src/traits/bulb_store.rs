// # Bulb Store Trait
//
// Defines the interface for persistent bulb records.
//
// ## Purpose
//
// The store is the source of truth the engine reconciles against:
// - Which addresses are registered (and in what order)
// - The last known state of each bulb
// - Whether each bulb answered its last refresh
//
// ## Implementations
//
// - In-memory: `MemoryBulbStore`
// - File-based: `FileBulbStore` (JSON with atomic writes)
//
// ## Usage
//
// ```rust,ignore
// use wiz_core::BulbStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* BulbStore implementation */;
//
//     store.add_bulb("192.168.1.20").await?;
//     store.update_bulb_down("192.168.1.20").await?;
//
//     for bulb in store.get_all_bulbs().await? {
//         println!("{} {:?}", bulb.address, bulb.reachable);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{BulbRecord, BulbState};

/// Trait for bulb store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Updates to different addresses must not clobber each other.
///
/// # Ordering
///
/// [`BulbStore::get_all_bulbs`] returns records in registration order.
///
/// # Errors
///
/// Every error is an infrastructure failure and is propagated to callers
/// unchanged. Updating an address that is not registered is not an error;
/// it is a no-op.
#[async_trait]
pub trait BulbStore: Send + Sync {
    /// Get one record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(BulbRecord))`: The stored record
    /// - `Ok(None)`: Address not registered
    /// - `Err(Error)`: Storage error
    async fn get_bulb(&self, address: &str) -> Result<Option<BulbRecord>, crate::Error>;

    /// Get every record, in registration order
    async fn get_all_bulbs(&self) -> Result<Vec<BulbRecord>, crate::Error>;

    /// Register an address
    ///
    /// Idempotent: registering a known address leaves its record untouched.
    /// Addresses are compared by exact string match.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A new record was created
    /// - `Ok(false)`: The address was already registered
    async fn add_bulb(&self, address: &str) -> Result<bool, crate::Error>;

    /// Record a successful refresh
    ///
    /// Sets the state fields, `reachable = UP` and `last_seen = now`.
    async fn update_bulb_state(&self, address: &str, state: BulbState)
    -> Result<(), crate::Error>;

    /// Record a failed refresh or command
    ///
    /// Sets `reachable = DOWN` and nothing else.
    async fn update_bulb_down(&self, address: &str) -> Result<(), crate::Error>;

    /// Change a bulb's display name
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Renamed
    /// - `Ok(false)`: Address not registered
    async fn rename_bulb(&self, address: &str, name: &str) -> Result<bool, crate::Error>;

    /// Remove a record
    ///
    /// The engine never calls this; it exists for external record management.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Deleted
    /// - `Ok(false)`: Address was not registered
    async fn delete_bulb(&self, address: &str) -> Result<bool, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
