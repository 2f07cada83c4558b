//! Core error types for blip-core.
//!
//! Every top-level operation in the reset subsystem degrades to a safe
//! default instead of surfacing these to a display surface; they exist so
//! the degraded paths can be logged and tested precisely.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by [`App`](crate::App) operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Shared store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No counter with this id
    #[error("Counter not found: {0}")]
    NotFound(uuid::Uuid),
}

/// Shared store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be opened (missing container, corruption).
    #[error("Store unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    /// A write was rejected; the next invocation recomputes from fresh state.
    #[error("Save failed: {0}")]
    SaveFailed(String),

    /// Read query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Another process holds the write lock past the busy timeout
    #[error("Store is locked")]
    Locked,

    /// A persisted row could not be decoded into a counter
    #[error("Corrupt row for counter {id}: {message}")]
    CorruptRow { id: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// One-time legacy store copy failures.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Could not create the shared container directory
    #[error("Failed to create shared container {path}: {source}")]
    CreateContainer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying one of the store files failed
    #[error("Failed to copy {from} to {to}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Widget timeline resolution failures; both degrade to placeholder data.
#[derive(Error, Debug)]
pub enum WidgetError {
    /// None of the configured counter ids exist any more
    #[error("No configured counter could be resolved")]
    UnresolvedSelection,

    /// Store could not be read
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown reset frequency name
    #[error("Unknown reset frequency: {0}")]
    UnknownFrequency(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
