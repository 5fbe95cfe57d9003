//! Snapshot persistence for the coin ledger

use crate::error::ChainError;
use crate::snapshot::Snapshot;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::debug;

/// Abstraction for persistence backends. Implementations must replace the
/// stored snapshot atomically: a reader sees either the old or the new one.
pub trait Persistence: Send + Sync {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ChainError>;
    /// `Ok(None)` when nothing has been saved yet.
    fn load_snapshot(&self) -> Result<Option<Snapshot>, ChainError>;
}

/// Stores the snapshot as a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl Persistence for JsonFilePersistence {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ChainError> {
        let bytes = snapshot.to_json()?;
        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        // Write to a sibling temp file then rename over the target so a crash
        // mid-write never leaves a truncated snapshot behind.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>, ChainError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Snapshot::from_json(&bytes).map(Some)
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), ChainError> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>, ChainError> {
        Ok(self.slot.lock().clone())
    }
}
