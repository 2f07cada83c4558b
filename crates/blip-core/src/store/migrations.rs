//! Schema migrations for the shared counter store.
//!
//! Migrations are versioned and applied when a store handle opens. The
//! `schema_version` table tracks the current version. Each step runs in its
//! own transaction so a second process opening the store concurrently either
//! sees the old schema or the new one.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn)?;
    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version; 0 for a fresh store.
pub fn schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0)
    }) {
        Ok(version) => Ok(version.unwrap_or(0)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: counters table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS counters (
            id                TEXT PRIMARY KEY,
            title             TEXT NOT NULL,
            value             INTEGER NOT NULL DEFAULT 0,
            step_increment    INTEGER NOT NULL DEFAULT 1,
            goal              INTEGER,
            color_name        TEXT NOT NULL DEFAULT 'blue',
            reset_value       INTEGER NOT NULL DEFAULT 0,
            reset_frequency   TEXT NOT NULL DEFAULT 'never',
            last_reset_date   TEXT NOT NULL,
            last_updated_date TEXT NOT NULL,
            sort_order        INTEGER NOT NULL DEFAULT 0,
            digit_count       INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_counters_sort_order ON counters(sort_order);",
    )?;
    set_schema_version(&tx, 1)?;

    tx.commit()
}
