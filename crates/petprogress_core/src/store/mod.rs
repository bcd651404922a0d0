//! Cross-process shared state container.
//!
//! # Responsibility
//! - Load and save the whole `AppState` record as one blob.
//! - Share decode/upgrade/fallback semantics across every backend.
//!
//! # Invariants
//! - `save` replaces the full record atomically; readers never observe a
//!   partial write, and a failed save leaves the previous record intact.
//! - No locking: the most recent successful `save` wins.
//! - `load` never fails because the record is absent or malformed.
//! - Callers keep each `load -> mutate -> save` cycle short and never nest two
//!   cycles in one process.

use crate::db::DbError;
use crate::model::state::AppState;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub mod file_store;
pub mod memory_store;
pub mod schema;
pub mod sqlite_store;

pub use file_store::FileStateStore;
pub use memory_store::MemoryStateStore;
pub use schema::{latest_version, LoadOutcome};
pub use sqlite_store::SqliteStateStore;

/// Storage key of the single shared record.
pub const STATE_STORAGE_KEY: &str = "petprogress.app_state";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Db(DbError),
    Serialize(serde_json::Error),
    UnsupportedSchemaVersion { found: u32, latest_supported: u32 },
    /// Backend refused the write without touching the stored record.
    WriteRejected(String),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::WriteRejected(_) => true,
            Self::Db(err) => err.is_retryable(),
            Self::Serialize(_) | Self::UnsupportedSchemaVersion { .. } => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "state storage i/o failed: {err}"),
            Self::Db(err) => write!(f, "state storage failed: {err}"),
            Self::Serialize(err) => write!(f, "state serialization failed: {err}"),
            Self::UnsupportedSchemaVersion {
                found,
                latest_supported,
            } => write!(
                f,
                "stored state schema version {found} is newer than supported {latest_supported}"
            ),
            Self::WriteRejected(reason) => write!(f, "state write rejected: {reason}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::WriteRejected(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Replace-only single-record store.
///
/// Backends implement raw blob I/O; `load`/`save` add the shared decode,
/// upgrade and logging behavior.
pub trait StateStore {
    /// Backend label used in log events.
    fn backend(&self) -> &'static str;

    /// Returns the stored blob, or `None` when nothing was ever saved.
    fn read_blob(&self) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically replaces the stored blob.
    fn write_blob(&self, blob: &[u8]) -> StoreResult<()>;

    /// Loads the latest record, upgrading and re-saving older versions.
    fn load(&self) -> StoreResult<AppState> {
        let started_at = Instant::now();
        let Some(blob) = self.read_blob()? else {
            info!(
                "event=state_load module=store status=ok backend={} outcome=fresh",
                self.backend()
            );
            return Ok(AppState::default());
        };

        let decoded = schema::decode_state(&blob)?;
        if let LoadOutcome::Upgraded { from } = decoded.outcome {
            match schema::encode_state(&decoded.state).and_then(|bytes| self.write_blob(&bytes)) {
                Ok(()) => info!(
                    "event=state_upgrade module=store status=ok backend={} from_version={} to_version={}",
                    self.backend(),
                    from,
                    decoded.state.schema_version
                ),
                Err(err) => warn!(
                    "event=state_upgrade module=store status=error backend={} from_version={} error={}",
                    self.backend(),
                    from,
                    err
                ),
            }
        }

        info!(
            "event=state_load module=store status=ok backend={} outcome={:?} bytes={} duration_ms={}",
            self.backend(),
            decoded.outcome,
            blob.len(),
            started_at.elapsed().as_millis()
        );
        Ok(decoded.state)
    }

    /// Saves the full record in one atomic write.
    fn save(&self, state: &AppState) -> StoreResult<()> {
        let started_at = Instant::now();
        let bytes = schema::encode_state(state)?;
        match self.write_blob(&bytes) {
            Ok(()) => {
                info!(
                    "event=state_save module=store status=ok backend={} bytes={} duration_ms={}",
                    self.backend(),
                    bytes.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=state_save module=store status=error backend={} retryable={} duration_ms={} error={}",
                    self.backend(),
                    err.is_retryable(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn read_blob(&self) -> StoreResult<Option<Vec<u8>>> {
        (**self).read_blob()
    }

    fn write_blob(&self, blob: &[u8]) -> StoreResult<()> {
        (**self).write_blob(blob)
    }
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn read_blob(&self) -> StoreResult<Option<Vec<u8>>> {
        (**self).read_blob()
    }

    fn write_blob(&self, blob: &[u8]) -> StoreResult<()> {
        (**self).write_blob(blob)
    }
}

/// Whether an in-memory mutation should be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    /// Save the mutated record, then return the value.
    Commit(T),
    /// Drop the in-memory copy; the stored record is not written.
    Discard(T),
}

/// Runs one `load -> mutate -> save` cycle.
///
/// `mutate` works on an in-memory copy. Any failure before the write leaves
/// the stored record untouched.
pub fn update<S, T>(store: &S, mutate: impl FnOnce(&mut AppState) -> Mutation<T>) -> StoreResult<T>
where
    S: StateStore + ?Sized,
{
    let mut state = store.load()?;
    match mutate(&mut state) {
        Mutation::Commit(value) => {
            store.save(&state)?;
            Ok(value)
        }
        Mutation::Discard(value) => Ok(value),
    }
}
