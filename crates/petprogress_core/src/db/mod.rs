//! SQLite bootstrap for the state-blob backend.
//!
//! # Responsibility
//! - Open and configure SQLite connections shared by host and display processes.
//! - Apply table migrations in deterministic order.
//!
//! # Invariants
//! - Table version is tracked via `PRAGMA user_version`, independent of the
//!   JSON record's own `schemaVersion`.
//! - No state blob is read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure opening or using the shared state database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// `user_version` written by a newer build; the file is left untouched.
    UnsupportedTableVersion {
        table_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Lock contention and I/O may clear up; a newer table layout will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Sqlite(_))
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "state database error: {err}"),
            Self::UnsupportedTableVersion {
                table_version,
                latest_supported,
            } => write!(
                f,
                "state database table version {table_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedTableVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;

    #[test]
    fn newer_table_layout_is_not_retryable() {
        let err = DbError::UnsupportedTableVersion {
            table_version: 9,
            latest_supported: 1,
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("state database table version 9"));

        let busy = DbError::from(rusqlite::Error::InvalidQuery);
        assert!(busy.is_retryable());
        assert!(busy.to_string().starts_with("state database error"));
    }
}
