//! One-time move of the pre-sharing private store into the shared container.
//!
//! Runs before the first [`SharedStore`](super::SharedStore) is opened. The
//! attempt is recorded in `preferences.toml` on every path, including
//! failure, so it never repeats.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{data_dir, shared_container_dir, LEGACY_STORE_FILE_NAME, STORE_FILE_NAME};
use crate::error::{ConfigError, MigrationError};

/// SQLite keeps the journal next to the main file; all three move together.
const STORE_FILE_SUFFIXES: [&str; 3] = ["", "-wal", "-shm"];

/// Private per-install flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub did_migrate_to_shared_store: bool,
}

impl Preferences {
    pub fn path() -> std::io::Result<PathBuf> {
        Ok(data_dir()?.join("preferences.toml"))
    }

    /// Read the flags; a missing or unreadable file means nothing was attempted.
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }
}

/// Source and destination of the legacy copy.
#[derive(Debug, Clone)]
pub struct LegacyPaths {
    pub legacy_store: PathBuf,
    pub shared_store: PathBuf,
    pub preferences: PathBuf,
}

impl LegacyPaths {
    /// Default locations for `app_group`.
    pub fn for_app_group(app_group: &str) -> std::io::Result<Self> {
        Ok(Self {
            legacy_store: data_dir()?.join(LEGACY_STORE_FILE_NAME),
            shared_store: shared_container_dir(app_group)?.join(STORE_FILE_NAME),
            preferences: Preferences::path()?,
        })
    }
}

#[derive(Debug)]
pub enum MigrationOutcome {
    AlreadyAttempted,
    NothingToMigrate,
    SharedStoreExists,
    Copied { files: usize },
    /// The copy failed; the shared store starts empty.
    Failed(MigrationError),
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn copy_store_files(from: &Path, to: &Path) -> Result<usize, MigrationError> {
    if let Some(dir) = to.parent() {
        std::fs::create_dir_all(dir).map_err(|source| MigrationError::CreateContainer {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut copied = Vec::new();
    for suffix in STORE_FILE_SUFFIXES {
        let src = with_suffix(from, suffix);
        if !src.exists() {
            continue;
        }
        let dst = with_suffix(to, suffix);
        if let Err(source) = std::fs::copy(&src, &dst) {
            // A partial copy would open as a corrupt store.
            for path in copied.iter().chain(std::iter::once(&dst)) {
                let _ = std::fs::remove_file(path);
            }
            return Err(MigrationError::CopyFailed {
                from: src,
                to: dst,
                source,
            });
        }
        copied.push(dst);
    }
    Ok(copied.len())
}

/// Copy the legacy store into the shared container at most once, ever.
pub fn migrate_legacy_store(paths: &LegacyPaths) -> MigrationOutcome {
    let mut prefs = Preferences::load_from(&paths.preferences);
    if prefs.did_migrate_to_shared_store {
        return MigrationOutcome::AlreadyAttempted;
    }

    let outcome = if !paths.legacy_store.exists() {
        MigrationOutcome::NothingToMigrate
    } else if paths.shared_store.exists() {
        MigrationOutcome::SharedStoreExists
    } else {
        match copy_store_files(&paths.legacy_store, &paths.shared_store) {
            Ok(files) => {
                info!(files, to = %paths.shared_store.display(), "migrated legacy store");
                MigrationOutcome::Copied { files }
            }
            Err(err) => {
                warn!(error = %err, "legacy store migration failed, starting with an empty store");
                MigrationOutcome::Failed(err)
            }
        }
    };

    prefs.did_migrate_to_shared_store = true;
    if let Err(err) = prefs.save_to(&paths.preferences) {
        warn!(error = %err, "could not record legacy store migration");
    }
    outcome
}
