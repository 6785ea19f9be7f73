//! SQLite-backed key-value store.
//!
//! Stores values in the `kv` table of `~/.config/accountable/accountable.db`.
//! Read-modify-write runs inside `BEGIN IMMEDIATE`, so two processes on the
//! same file never interleave an update.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::migrations;
use super::KeyValueStore;
use crate::error::StorageError;

/// How long a writer waits for another process's lock before `Locked`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `path`, creating file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn).map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn select_value(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value)
}

fn upsert_value(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock()?;
        select_value(&conn, key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock()?;
        upsert_value(&conn, key, value)
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<String>) -> Result<String, StorageError>,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let next = apply(select_value(&tx, key)?)?;
        upsert_value(&tx, key, &next)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_value() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.read("k").unwrap(), None);
        store.write("k", "one").unwrap();
        store.write("k", "two").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accountable.db");
        SqliteStore::open(&path).unwrap().write("k", "v").unwrap();
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn update_on_shared_file_keeps_both_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accountable.db");
        let a = SqliteStore::open(&path).unwrap();
        let b = SqliteStore::open(&path).unwrap();

        a.update("k", &mut |current| Ok(format!("{}a", current.unwrap_or_default())))
            .unwrap();
        b.update("k", &mut |current| Ok(format!("{}b", current.unwrap_or_default())))
            .unwrap();
        assert_eq!(a.read("k").unwrap().as_deref(), Some("ab"));
    }

    #[test]
    fn failed_update_rolls_back() {
        let store = SqliteStore::open_memory().unwrap();
        store.write("k", "v").unwrap();
        let err = store
            .update("k", &mut |_| Err(StorageError::Locked))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));
    }
}
