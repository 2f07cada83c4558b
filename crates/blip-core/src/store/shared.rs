//! SQLite-backed shared counter store.
//!
//! One database file lives in the app-group container and is opened by both
//! the interactive process and widget processes. Concurrency control is left
//! to SQLite: WAL journaling lets readers proceed during a write, writers
//! serialize on the database lock, and `busy_timeout` bounds how long a
//! writer waits before the operation fails with [`StoreError::Locked`] or
//! [`StoreError::SaveFailed`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use super::{migrations, shared_container_dir, CounterStore, STORE_FILE_NAME};
use crate::counter::{Counter, ResetFrequency};
use crate::error::StoreError;

/// Upper bound on waiting for another process's write lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

const COUNTER_COLUMNS: &str = "id, title, value, step_increment, goal, color_name, reset_value,
    reset_frequency, last_reset_date, last_updated_date, sort_order, digit_count, created_at";

/// Raw column values before timestamp and enum decoding.
struct CounterRow {
    id: String,
    title: String,
    value: i64,
    step_increment: i64,
    goal: Option<i64>,
    color_name: String,
    reset_value: i64,
    reset_frequency: String,
    last_reset_date: String,
    last_updated_date: String,
    sort_order: i64,
    digit_count: u32,
    created_at: String,
}

impl CounterRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            value: row.get(2)?,
            step_increment: row.get(3)?,
            goal: row.get(4)?,
            color_name: row.get(5)?,
            reset_value: row.get(6)?,
            reset_frequency: row.get(7)?,
            last_reset_date: row.get(8)?,
            last_updated_date: row.get(9)?,
            sort_order: row.get(10)?,
            digit_count: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_counter(self) -> Result<Counter, StoreError> {
        let corrupt = |message: String| StoreError::CorruptRow {
            id: self.id.clone(),
            message,
        };
        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let reset_frequency = self
            .reset_frequency
            .parse::<ResetFrequency>()
            .map_err(|e| corrupt(e.to_string()))?;
        let last_reset_date = parse_timestamp(&self.last_reset_date).map_err(&corrupt)?;
        let last_updated_date = parse_timestamp(&self.last_updated_date).map_err(&corrupt)?;
        let created_at = parse_timestamp(&self.created_at).map_err(&corrupt)?;

        Ok(Counter {
            id,
            title: self.title,
            value: self.value,
            step_increment: self.step_increment,
            goal: self.goal,
            color_name: self.color_name,
            reset_value: self.reset_value,
            reset_frequency,
            last_reset_date,
            last_updated_date,
            sort_order: self.sort_order,
            digit_count: self.digit_count,
            created_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{raw}': {e}"))
}

fn save_failed(err: rusqlite::Error) -> StoreError {
    StoreError::SaveFailed(err.to_string())
}

fn query_all(conn: &Connection) -> Result<Vec<Counter>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUNTER_COLUMNS} FROM counters ORDER BY sort_order, created_at"
    ))?;
    let rows = stmt.query_map([], CounterRow::from_row)?;

    let mut counters = Vec::new();
    for row in rows {
        counters.push(row?.into_counter()?);
    }
    Ok(counters)
}

/// Insert or replace `counters`. The caller owns the transaction.
fn upsert(conn: &Connection, counters: &[Counter]) -> Result<(), StoreError> {
    if counters.is_empty() {
        return Ok(());
    }

    let mut stmt = conn
        .prepare(&format!(
            "INSERT INTO counters ({COUNTER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                value = excluded.value,
                step_increment = excluded.step_increment,
                goal = excluded.goal,
                color_name = excluded.color_name,
                reset_value = excluded.reset_value,
                reset_frequency = excluded.reset_frequency,
                last_reset_date = excluded.last_reset_date,
                last_updated_date = excluded.last_updated_date,
                sort_order = excluded.sort_order,
                digit_count = excluded.digit_count"
        ))
        .map_err(save_failed)?;

    for c in counters {
        stmt.execute(params![
            c.id.to_string(),
            c.title,
            c.value,
            c.step_increment,
            c.goal,
            c.color_name,
            c.reset_value,
            c.reset_frequency.as_str(),
            c.last_reset_date.to_rfc3339(),
            c.last_updated_date.to_rfc3339(),
            c.sort_order,
            c.digit_count,
            c.created_at.to_rfc3339(),
        ])
        .map_err(save_failed)?;
    }
    Ok(())
}

/// Shared counter store backed by a single SQLite file.
pub struct SharedStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SharedStore {
    /// Open the store in the container for `app_group`.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the container or database
    /// cannot be opened or migrated.
    pub fn open(app_group: &str) -> Result<Self, StoreError> {
        let dir = shared_container_dir(app_group).map_err(|e| StoreError::Unavailable {
            path: PathBuf::from(app_group),
            reason: e.to_string(),
        })?;
        Self::open_at(&dir.join(STORE_FILE_NAME))
    }

    /// Open (creating if needed) the store at an explicit path.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the database cannot be opened
    /// or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let unavailable = |e: rusqlite::Error| StoreError::Unavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(unavailable)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(unavailable)?;
        migrations::migrate(&conn).map_err(unavailable)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (for tests and previews).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        let unavailable = |e: rusqlite::Error| StoreError::Unavailable {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        };
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        migrations::migrate(&conn).map_err(unavailable)?;
        Ok(Self { conn, path: None })
    }

    /// Location on disk, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl CounterStore for SharedStore {
    fn fetch_all(&self) -> Result<Vec<Counter>, StoreError> {
        query_all(&self.conn)
    }

    fn save(&self, counters: &[Counter]) -> Result<(), StoreError> {
        if counters.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction().map_err(save_failed)?;
        upsert(&tx, counters)?;
        tx.commit().map_err(save_failed)
    }

    fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Vec<Counter>) -> Result<(Vec<Counter>, T), E>,
        E: From<StoreError>,
    {
        // IMMEDIATE takes the write lock before reading, so the rows `f` sees
        // are still current when its changes are written.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let counters = query_all(&tx)?;
        let (changed, output) = f(counters)?;
        upsert(&tx, &changed)?;
        tx.commit().map_err(save_failed)?;
        Ok(output)
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM counters WHERE id = ?1", params![id.to_string()])
            .map_err(save_failed)?;
        Ok(removed > 0)
    }

    fn get(&self, id: Uuid) -> Result<Option<Counter>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {COUNTER_COLUMNS} FROM counters WHERE id = ?1"),
                params![id.to_string()],
                CounterRow::from_row,
            )
            .optional()?;
        row.map(CounterRow::into_counter).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(title: &str, sort_order: i64) -> Counter {
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let mut c = Counter::new(title, now);
        c.sort_order = sort_order;
        c
    }

    #[test]
    fn save_and_fetch_in_sort_order() {
        let store = SharedStore::open_memory().unwrap();
        let second = sample("Second", 2);
        let first = sample("First", 1);
        store.save(&[second.clone(), first.clone()]).unwrap();

        let all = store.fetch_all().unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[test]
    fn save_upserts_existing_rows() {
        let store = SharedStore::open_memory().unwrap();
        let mut c = sample("Water", 0);
        c.goal = Some(8);
        store.save(std::slice::from_ref(&c)).unwrap();

        c.value = 5;
        c.reset_frequency = ResetFrequency::Daily;
        store.save(std::slice::from_ref(&c)).unwrap();

        let all = store.fetch_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], c);
    }

    #[test]
    fn get_and_delete() {
        let store = SharedStore::open_memory().unwrap();
        let c = sample("Coffee", 0);
        store.save(std::slice::from_ref(&c)).unwrap();

        assert_eq!(store.get(c.id).unwrap(), Some(c.clone()));
        assert!(store.delete(c.id).unwrap());
        assert!(!store.delete(c.id).unwrap());
        assert_eq!(store.get(c.id).unwrap(), None);
    }

    #[test]
    fn transact_writes_returned_counters() {
        let store = SharedStore::open_memory().unwrap();
        let c = sample("Steps", 0);
        store.save(std::slice::from_ref(&c)).unwrap();

        let seen = store
            .transact(|mut counters| {
                let count = counters.len();
                counters[0].value = 42;
                Ok::<_, StoreError>((counters, count))
            })
            .unwrap();

        assert_eq!(seen, 1);
        assert_eq!(store.get(c.id).unwrap().unwrap().value, 42);
    }

    #[test]
    fn failed_transact_writes_nothing() {
        let store = SharedStore::open_memory().unwrap();
        let c = sample("Steps", 0);
        store.save(std::slice::from_ref(&c)).unwrap();

        let result: Result<(), StoreError> = store.transact(|_| Err(StoreError::Locked));
        assert!(matches!(result, Err(StoreError::Locked)));

        // The connection is usable again and the row is unchanged.
        store
            .transact(|counters| Ok::<_, StoreError>((Vec::new(), counters)))
            .unwrap();
        assert_eq!(store.get(c.id).unwrap(), Some(c));
    }

    #[test]
    fn corrupt_frequency_is_reported() {
        let store = SharedStore::open_memory().unwrap();
        let c = sample("Broken", 0);
        store.save(std::slice::from_ref(&c)).unwrap();
        store
            .conn
            .execute("UPDATE counters SET reset_frequency = 'hourly'", [])
            .unwrap();

        assert!(matches!(
            store.fetch_all(),
            Err(StoreError::CorruptRow { .. })
        ));
    }

    #[test]
    fn missing_container_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist").join(STORE_FILE_NAME);
        assert!(matches!(
            SharedStore::open_at(&path),
            Err(StoreError::Unavailable { .. })
        ));
    }
}
