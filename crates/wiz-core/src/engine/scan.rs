//! Discovery: find bulbs, register them, refresh everything

use tracing::{info, warn};

use super::{BulbEvent, Reconciler};
use crate::error::Result;
use crate::model::BulbRecord;

impl Reconciler {
    /// Discover bulbs in `range`, register new ones, then refresh all bulbs
    ///
    /// A blank `range` uses `discovery.default_range`. Discovery failures
    /// are logged and treated as "nothing found"; already registered bulbs
    /// are still refreshed. Addresses are matched exactly, so a bulb already
    /// in the store is never registered twice.
    ///
    /// # Returns
    ///
    /// Every registered bulb (old and new), refreshed, in store order
    pub async fn scan(&self, range: &str) -> Result<Vec<BulbRecord>> {
        let range = match range.trim() {
            "" => self.inner.default_range.as_str(),
            given => given,
        };
        info!("Scanning for bulbs in '{}'", range);

        let discovered = match self.inner.discovery.discover(range).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!("Discovery failed for '{}': {}", range, e);
                Vec::new()
            }
        };

        let mut registered = 0;
        for address in &discovered {
            if self.inner.store.add_bulb(address).await? {
                info!("Registered new bulb {}", address);
                registered += 1;
                self.emit_event(BulbEvent::Registered {
                    address: address.clone(),
                });
            }
        }

        info!(
            "Discovered {} bulb(s), {} new",
            discovered.len(),
            registered
        );
        self.emit_event(BulbEvent::ScanCompleted {
            discovered: discovered.len(),
            registered,
        });

        self.refresh_all().await
    }
}
