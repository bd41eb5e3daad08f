// # File Bulb Store
//
// File-based implementation of BulbStore with crash recovery.
//
// ## Purpose
//
// Keeps the registered bulbs and their last known state across daemon
// restarts, so a restart does not forget bulbs that are currently down.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## Sharing
//
// Several processes may open the same file (a running poll loop and one-off
// commands). Every operation takes an exclusive advisory lock on a sidecar
// `.lock` file, re-reads the store file, applies its change and writes the
// result back before releasing the lock. Nothing is cached between calls.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "bulbs": [
//     {
//       "address": "192.168.1.20",
//       "name": "Desk",
//       "reachable": "up",
//       "power_state": true,
//       "scene_id": 11,
//       "scene_name": "Warm White",
//       "brightness": 255,
//       "last_seen": "2025-01-09T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::BulbTable;
use crate::Error;
use crate::model::{BulbRecord, BulbState};
use crate::traits::BulbStore;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based bulb store with crash recovery
///
/// Every mutation is written through to disk before the call returns. If a
/// write fails the change is kept, the error is returned, and the next call
/// (or [`BulbStore::flush`]) applies it again on top of the file's current
/// content.
///
/// # Example
///
/// ```rust,no_run
/// use wiz_core::state::FileBulbStore;
/// use wiz_core::traits::BulbStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileBulbStore::new("/var/lib/wiz/bulbs.json").await?;
///
///     store.add_bulb("192.168.1.20").await?;
///     assert_eq!(store.get_all_bulbs().await?.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileBulbStore {
    path: PathBuf,
    /// Changes not yet written, oldest first
    pending: Mutex<Vec<Change>>,
}

/// One store mutation, replayable against a freshly loaded table
#[derive(Debug, Clone)]
enum Change {
    Add(String),
    State(String, BulbState),
    Down(String),
    Rename(String, String),
    Delete(String),
}

impl Change {
    /// Returns `true` if the table changed
    fn apply(&self, table: &mut BulbTable) -> bool {
        match self {
            Change::Add(address) => table.add(address),
            Change::State(address, state) => table.update_state(address, state.clone()),
            Change::Down(address) => table.update_down(address),
            Change::Rename(address, name) => table.rename(address, name),
            Change::Delete(address) => table.delete(address),
        }
    }
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    bulbs: BulbTable,
}

/// Why loading a store file failed
enum LoadError {
    /// Content is not a valid store file
    Corrupt(String),
    /// File could not be read at all
    Unreadable(Error),
}

impl FileBulbStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing store file
    /// 3. If it is corrupted, load the backup and restore it
    /// 4. If both are unusable, start with an empty store
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let store = Self {
            path,
            pending: Mutex::new(Vec::new()),
        };
        let (table, _) = store.sync(None).await?;
        tracing::debug!("Loaded bulb store: {} bulbs", table.len());
        Ok(store)
    }

    /// Bring the file up to date with the pending changes plus `change`
    ///
    /// Returns the table as written and whether `change` modified it. On
    /// failure every change stays pending.
    async fn sync(&self, change: Option<Change>) -> Result<(BulbTable, bool), Error> {
        let mut pending = self.pending.lock().await;
        let has_change = change.is_some();
        pending.extend(change);

        let path = self.path.clone();
        let changes = pending.clone();
        let (table, applied) =
            tokio::task::spawn_blocking(move || Self::transact(&path, &changes)).await??;

        pending.clear();
        let changed = has_change && applied.last().copied().unwrap_or(false);
        Ok((table, changed))
    }

    /// Load, apply and write back under the file lock
    fn transact(path: &Path, changes: &[Change]) -> Result<(BulbTable, Vec<bool>), Error> {
        let lock_path = Self::lock_path(path);
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                Error::store(format!("Failed to open {}: {}", lock_path.display(), e))
            })?;
        let mut lock = FileLock::new(lock_file);
        let _held = lock.write().map_err(|e| {
            Error::store(format!("Failed to lock {}: {}", lock_path.display(), e))
        })?;

        let mut table = Self::load_with_recovery(path)?;
        let applied: Vec<bool> = changes.iter().map(|c| c.apply(&mut table)).collect();
        if applied.contains(&true) {
            Self::persist(path, &table)?;
        }
        Ok((table, applied))
    }

    fn load_with_recovery(path: &Path) -> Result<BulbTable, Error> {
        let reason = match Self::load(path) {
            Ok(table) => return Ok(table),
            Err(LoadError::Unreadable(e)) => return Err(e),
            Err(LoadError::Corrupt(reason)) => reason,
        };

        tracing::warn!(
            "Bulb store appears corrupted: {}. Attempting recovery from backup.",
            reason
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty bulb store.");
            return Ok(BulbTable::default());
        }

        match Self::load(&backup_path) {
            Ok(table) => {
                tracing::info!("Recovered bulb store from backup: {} bulbs", table.len());
                if let Err(e) = fs::copy(&backup_path, path) {
                    tracing::error!("Failed to restore bulb store from backup: {}", e);
                }
                Ok(table)
            }
            Err(LoadError::Corrupt(backup_reason)) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty bulb store.",
                    backup_reason
                );
                Ok(BulbTable::default())
            }
            Err(LoadError::Unreadable(e)) => Err(e),
        }
    }

    fn load(path: &Path) -> Result<BulbTable, LoadError> {
        if !path.exists() {
            tracing::trace!("Bulb store does not exist yet: {}", path.display());
            return Ok(BulbTable::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            LoadError::Unreadable(Error::store(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)
            .map_err(|e| LoadError::Corrupt(format!("{}: {}", path.display(), e)))?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Bulb store version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.bulbs)
    }

    /// Write the table to disk: temp file, backup, rename
    fn persist(path: &Path, table: &BulbTable) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            bulbs: table.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize bulb store: {}", e)))?;

        let temp_path = Self::temp_path(path);
        {
            let mut out = fs::File::create(&temp_path).map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.sync_all().map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if path.exists()
            && let Err(e) = fs::copy(path, Self::backup_path(path))
        {
            tracing::warn!("Failed to create bulb store backup: {}", e);
        }

        fs::rename(&temp_path, path).map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("Bulb store written: {}", path.display());
        Ok(())
    }

    async fn mutate(&self, change: Change) -> Result<bool, Error> {
        let (_, changed) = self.sync(Some(change)).await?;
        Ok(changed)
    }

    fn temp_path(path: &Path) -> PathBuf {
        path.with_extension("tmp")
    }

    fn backup_path(path: &Path) -> PathBuf {
        path.with_extension("backup")
    }

    fn lock_path(path: &Path) -> PathBuf {
        path.with_extension("lock")
    }
}

#[async_trait]
impl BulbStore for FileBulbStore {
    async fn get_bulb(&self, address: &str) -> Result<Option<BulbRecord>, Error> {
        let (table, _) = self.sync(None).await?;
        Ok(table.get(address).cloned())
    }

    async fn get_all_bulbs(&self) -> Result<Vec<BulbRecord>, Error> {
        let (table, _) = self.sync(None).await?;
        Ok(table.all())
    }

    async fn add_bulb(&self, address: &str) -> Result<bool, Error> {
        self.mutate(Change::Add(address.to_string())).await
    }

    async fn update_bulb_state(&self, address: &str, state: BulbState) -> Result<(), Error> {
        self.mutate(Change::State(address.to_string(), state))
            .await
            .map(|_| ())
    }

    async fn update_bulb_down(&self, address: &str) -> Result<(), Error> {
        self.mutate(Change::Down(address.to_string())).await.map(|_| ())
    }

    async fn rename_bulb(&self, address: &str, name: &str) -> Result<bool, Error> {
        self.mutate(Change::Rename(address.to_string(), name.to_string()))
            .await
    }

    async fn delete_bulb(&self, address: &str) -> Result<bool, Error> {
        self.mutate(Change::Delete(address.to_string())).await
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.pending.lock().await.is_empty() {
            return Ok(());
        }
        self.sync(None).await.map(|_| ())
    }
}
