//! SQLite-backed persistent state.
//!
//! Provides:
//! - Key-value store for feature flags, the alert ledger and armed-timer records
//! - History of fired alerts

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::alerts::Boundary;
use crate::error::DatabaseError;

use super::data_dir;
use super::store::KeyValueStore;

/// One fired alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub entry_id: String,
    pub boundary: Boundary,
    pub occurrence: NaiveDateTime,
    pub fired_at: NaiveDateTime,
}

/// SQLite database for persisted watch face state.
///
/// The connection sits behind a mutex so the store can be shared between the
/// render thread and timer callbacks.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/wristplan/wristplan.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join("wristplan.db"))
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_millis(50))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.lock()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS alert_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id    TEXT NOT NULL,
                boundary    TEXT NOT NULL,
                occurrence  TEXT NOT NULL,
                fired_at    TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_alert_log_fired_at ON alert_log(fired_at);",
        )?;
        Ok(())
    }

    /// Append a fired alert to the history.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_alert(
        &self,
        entry_id: &str,
        boundary: Boundary,
        occurrence: NaiveDateTime,
        fired_at: NaiveDateTime,
    ) -> Result<i64, DatabaseError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO alert_log (entry_id, boundary, occurrence, fired_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry_id,
                boundary.as_str(),
                occurrence.format(STAMP).to_string(),
                fired_at.format(STAMP).to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent fired alerts, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, entry_id, boundary, occurrence, fired_at
             FROM alert_log
             ORDER BY fired_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, entry_id, boundary, occurrence, fired_at) = row?;
            let Some(boundary) = Boundary::parse(&boundary) else {
                tracing::warn!(id, boundary = %boundary, "skipping alert_log row with unknown boundary");
                continue;
            };
            records.push(AlertRecord {
                id,
                entry_id,
                boundary,
                occurrence: parse_stamp(&occurrence)?,
                fired_at: parse_stamp(&fired_at)?,
            });
        }
        Ok(records)
    }
}

const STAMP: &str = "%Y-%m-%dT%H:%M:%S";

fn parse_stamp(raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, STAMP)
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.lock()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DatabaseError> {
        self.lock()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, DatabaseError> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front so another process sharing
        // the file cannot interleave between the read and the write.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<String> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, new],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM kv WHERE substr(key, 1, ?2) = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix, prefix.chars().count() as i64], |row| {
            row.get::<_, String>(0)
        })?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.get("test").unwrap().is_none());
        db.put("test", "hello").unwrap();
        assert_eq!(db.get("test").unwrap().unwrap(), "hello");
        db.remove("test").unwrap();
        assert!(db.get("test").unwrap().is_none());
    }

    #[test]
    fn compare_and_swap_checks_current_value() {
        let db = Database::open_memory().unwrap();
        assert!(db.compare_and_swap("k", None, "one").unwrap());
        assert!(!db.compare_and_swap("k", None, "two").unwrap());
        assert!(!db.compare_and_swap("k", Some("zero"), "two").unwrap());
        assert!(db.compare_and_swap("k", Some("one"), "two").unwrap());
        assert_eq!(db.get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn prefix_scan_does_not_treat_underscore_as_wildcard() {
        let db = Database::open_memory().unwrap();
        db.put("armed.start", "x").unwrap();
        db.put("armed.end", "x").unwrap();
        db.put("armedXstart", "x").unwrap();
        assert_eq!(
            db.keys_with_prefix("armed.").unwrap(),
            ["armed.end", "armed.start"]
        );
    }

    #[test]
    fn alert_history_newest_first() {
        let db = Database::open_memory().unwrap();
        db.record_alert("A@09:00", Boundary::Start, at(9, 0), at(9, 0))
            .unwrap();
        db.record_alert("A@09:00", Boundary::End, at(10, 0), at(9, 59))
            .unwrap();
        let recent = db.recent_alerts(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].boundary, Boundary::End);
        assert_eq!(recent[1].occurrence, at(9, 0));
        assert_eq!(db.recent_alerts(1).unwrap().len(), 1);
    }
}
