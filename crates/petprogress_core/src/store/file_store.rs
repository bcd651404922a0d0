//! Single-file JSON backend with temp-file + rename commits.
//!
//! # Invariants
//! - The temp file lives in the target's directory, so `rename` never
//!   crosses filesystems and stays atomic.
//! - Temp files are uniquely named; concurrent writers from two processes
//!   never share one.
//! - Data is fsynced before the rename publishes it.

use crate::store::{StateStore, StoreError, StoreResult};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Shared-container file backend.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl StateStore for FileStateStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn read_blob(&self) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn write_blob(&self, blob: &[u8]) -> StoreResult<()> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(blob)?;
        temp.as_file().sync_all()?;
        // On failure the temp file is dropped and removed; the target is untouched.
        temp.persist(&self.path)
            .map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }
}
