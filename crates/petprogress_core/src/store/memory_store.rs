//! In-memory backend used in tests and previews.

use crate::model::state::AppState;
use crate::store::{schema, StateStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Volatile store with the same load/save semantics as durable backends.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    blob: Mutex<Option<Vec<u8>>>,
    fail_next_write: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state`.
    pub fn with_state(state: &AppState) -> StoreResult<Self> {
        let store = Self::new();
        store.set_raw(schema::encode_state(state)?);
        Ok(store)
    }

    /// Replaces the stored bytes directly, bypassing encoding.
    pub fn set_raw(&self, blob: Vec<u8>) {
        if let Ok(mut guard) = self.blob.lock() {
            *guard = Some(blob);
        }
    }

    pub fn raw(&self) -> Option<Vec<u8>> {
        self.blob.lock().ok().and_then(|guard| guard.clone())
    }

    /// Makes the next write fail without touching the stored bytes.
    pub fn fail_next_save(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Number of successful writes, including upgrade re-saves.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn read_blob(&self) -> StoreResult<Option<Vec<u8>>> {
        let guard = self
            .blob
            .lock()
            .map_err(|_| StoreError::WriteRejected("memory store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn write_blob(&self, blob: &[u8]) -> StoreResult<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::WriteRejected(
                "injected write failure".to_string(),
            ));
        }
        let mut guard = self
            .blob
            .lock()
            .map_err(|_| StoreError::WriteRejected("memory store lock poisoned".to_string()))?;
        *guard = Some(blob.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
