mod bootstrap;
mod config;
pub mod migrations;
mod shared;

pub use bootstrap::{migrate_legacy_store, LegacyPaths, MigrationOutcome, Preferences};
pub use config::{CalendarConfig, Config, RefreshConfig, StoreConfig};
pub use shared::SharedStore;

use std::path::PathBuf;
use uuid::Uuid;

use crate::counter::Counter;
use crate::error::StoreError;

/// File name of the shared store inside the app-group container.
pub const STORE_FILE_NAME: &str = "Blip.sqlite";

/// File name of the pre-sharing private store.
pub const LEGACY_STORE_FILE_NAME: &str = "default.store";

/// Read-all / write-through access to persisted counters.
///
/// Implementations must be safe to use from two processes at once against
/// the same location; `save` is all-or-nothing.
pub trait CounterStore {
    /// Every counter, ordered by `sort_order`.
    fn fetch_all(&self) -> Result<Vec<Counter>, StoreError>;

    /// Insert or replace the given counters in a single transaction.
    fn save(&self, counters: &[Counter]) -> Result<(), StoreError>;

    /// Remove a counter. Returns whether a row was deleted.
    fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Read every counter, let `f` decide what changes, then write the
    /// counters it returns, all inside one write transaction.
    ///
    /// No other process can write between the read and the write. Nothing is
    /// written when `f` fails.
    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Vec<Counter>) -> Result<(Vec<Counter>, T), E>,
        E: From<StoreError>;

    /// Fallback lookup that scans [`fetch_all`](Self::fetch_all). Stores
    /// that can query by key should override it.
    fn get(&self, id: Uuid) -> Result<Option<Counter>, StoreError> {
        Ok(self.fetch_all()?.into_iter().find(|c| c.id == id))
    }
}

impl<S: CounterStore + ?Sized> CounterStore for &S {
    fn fetch_all(&self) -> Result<Vec<Counter>, StoreError> {
        (**self).fetch_all()
    }

    fn save(&self, counters: &[Counter]) -> Result<(), StoreError> {
        (**self).save(counters)
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        (**self).delete(id)
    }

    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Vec<Counter>) -> Result<(Vec<Counter>, T), E>,
        E: From<StoreError>,
    {
        (**self).transact(f)
    }

    fn get(&self, id: Uuid) -> Result<Option<Counter>, StoreError> {
        (**self).get(id)
    }
}

/// Returns the private data directory, `~/.config/blip[-dev]/`.
///
/// `BLIP_DATA_DIR` overrides the location; `BLIP_ENV=dev` selects the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("BLIP_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("BLIP_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("blip-dev")
            } else {
                base_dir.join("blip")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the container directory shared by every process of `app_group`.
///
/// `BLIP_CONTAINER_DIR` overrides the location.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn shared_container_dir(app_group: &str) -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("BLIP_CONTAINER_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("group-containers")
            .join(app_group),
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
