//! SQLite-backed key store.

use std::path::Path;
use std::sync::Mutex;

use custody_types::{CustodyError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

/// [`KeyStore`](crate::KeyStore) backend over a single SQLite database.
///
/// Access is serialized through one connection; the store only ever sees
/// short metadata reads and writes, so contention is not a concern.
pub struct SqliteKeyStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(to_storage_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!(path = %path.as_ref().display(), "key store opened");
        Ok(store)
    }

    /// Fully in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(to_storage_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS keys (
                 name       TEXT PRIMARY KEY,
                 value      TEXT NOT NULL,
                 created_at INTEGER NOT NULL,
                 seq        INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_keys_created ON keys (created_at, seq);",
        )
        .map_err(to_storage_error)
    }
}

impl crate::KeyStore for SqliteKeyStore {
    fn put(&self, name: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        let created_at = chrono::Utc::now().timestamp();
        let seq: i64 = conn
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM keys", [], |row| {
                row.get(0)
            })
            .map_err(to_storage_error)?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO keys (name, value, created_at, seq) VALUES (?1, ?2, ?3, ?4)",
                params![name, value, created_at, seq],
            )
            .map_err(to_storage_error)?;

        if inserted == 0 {
            return Err(CustodyError::StorageFailure(format!(
                "key already exists: {}",
                name
            )));
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        conn.query_row(
            "SELECT value FROM keys WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(to_storage_error)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        let mut stmt = conn
            .prepare("SELECT name FROM keys ORDER BY name")
            .map_err(to_storage_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(to_storage_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(to_storage_error)
    }

    fn last_created(&self) -> Result<Option<(String, u64)>> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        conn.query_row(
            "SELECT name, created_at FROM keys ORDER BY created_at DESC, seq DESC LIMIT 1",
            [],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)),
        )
        .optional()
        .map_err(to_storage_error)
    }
}

fn to_storage_error(err: rusqlite::Error) -> CustodyError {
    CustodyError::StorageFailure(err.to_string())
}
