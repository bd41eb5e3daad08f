//! Per-address serialization

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// One async mutex per bulb address
///
/// Operations on the same bulb (a refresh, or a command and its follow-up
/// refresh) hold the address lock for their whole duration. Different
/// addresses never contend. An address's entry lives only while someone
/// holds or waits for its lock.
#[derive(Debug, Default)]
pub(crate) struct AddressLocks {
    locks: Mutex<LockMap>,
}

/// Exclusive access to one address; released on drop
pub(crate) struct AddressGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    address: String,
    owner: &'a AddressLocks,
}

impl AddressLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `address`
    pub(crate) async fn lock(&self, address: &str) -> AddressGuard<'_> {
        let lock = Arc::clone(self.map().entry(address.to_string()).or_default());
        AddressGuard {
            guard: Some(lock.lock_owned().await),
            address: address.to_string(),
            owner: self,
        }
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        // Critical sections never panic while holding the map
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.map().len()
    }
}

impl Drop for AddressGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut map = self.owner.map();
        if map
            .get(&self.address)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.address);
        }
    }
}
