//! SQLite backend: the whole record is one row keyed by storage key.
//!
//! # Invariants
//! - A save is a single upsert committed in its own transaction, so readers
//!   see either the previous row or the new one.
//! - The connection has migrations applied before first use.

use crate::db::{open_db, open_db_in_memory};
use crate::store::{StateStore, StoreResult, STATE_STORAGE_KEY};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite state backend.
pub struct SqliteStateStore {
    conn: Connection,
    key: String,
}

impl SqliteStateStore {
    /// Opens the shared database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::with_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::with_connection(open_db_in_memory()?))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            key: STATE_STORAGE_KEY.to_string(),
        }
    }

    /// Uses a different row key, e.g. to keep a preview record next to the
    /// real one.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

impl StateStore for SqliteStateStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn read_blob(&self) -> StoreResult<Option<Vec<u8>>> {
        let blob = self
            .conn
            .query_row(
                "SELECT payload FROM state_blobs WHERE key = ?1;",
                params![self.key.as_str()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(blob)
    }

    fn write_blob(&self, blob: &[u8]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO state_blobs (key, payload, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at;",
            params![self.key.as_str(), blob],
        )?;
        tx.commit()?;
        Ok(())
    }
}
