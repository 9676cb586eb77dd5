//! File-backed snapshot store.
//!
//! The whole collection lives in one JSON document:
//! ```text
//! {
//!   "learning_notes": [...],
//!   "cards": [...],
//!   "review_logs": [...]
//! }
//! ```
//! Writes go to a uniquely named temporary file next to the store and are
//! renamed over the original, so a reader sees either the old or the new
//! document, never a partial one.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use tempfile::Builder;

use crate::error::Result;
use crate::models::{Collection, Snapshot};

pub struct Store {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty snapshot file if none exists yet.
    pub fn init(&self) -> Result<()> {
        let _guard = self.guard();
        if !self.path.exists() {
            self.persist(&Snapshot::default())?;
        }
        Ok(())
    }

    /// Loads the current snapshot.
    ///
    /// A missing file is created empty. An unparseable file yields an empty
    /// snapshot; its bytes are copied to `<path>.corrupt` first.
    pub fn read(&self) -> Result<Snapshot> {
        let _guard = self.guard();
        self.load()
    }

    /// Atomically replaces the persisted snapshot.
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let _guard = self.guard();
        self.persist(snapshot)
    }

    /// Runs a read-modify-write cycle while holding the store lock.
    ///
    /// The snapshot is only written back if `f` succeeds.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot) -> Result<T>,
    {
        let _guard = self.guard();
        let mut snapshot = self.load()?;
        let value = f(&mut snapshot)?;
        self.persist(&snapshot)?;
        Ok(value)
    }

    // The mutex guards no data of its own, so a poisoned lock is still usable.
    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            debug!("Initializing empty store at {:?}", self.path);
            let snapshot = Snapshot::default();
            self.persist(&snapshot)?;
            return Ok(snapshot);
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                let backup = self.sibling(".corrupt");
                warn!(
                    "Store {:?} is unreadable ({}); continuing with an empty snapshot, original kept at {:?}",
                    self.path, e, backup
                );
                if let Err(e) = fs::write(&backup, content) {
                    warn!("Could not back up corrupt store to {:?}: {}", backup, e);
                }
                Ok(Snapshot::default())
            }
        }
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut prefix: OsString = self.path.file_name().unwrap_or_default().to_os_string();
        prefix.push(".");
        let json = serde_json::to_vec_pretty(snapshot)?;
        let mut tmp = Builder::new().prefix(&prefix).suffix(".tmp").tempfile_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Next free ID of a collection: one past the largest ID, or 1 when empty.
pub fn next_id(snapshot: &Snapshot, collection: Collection) -> u64 {
    let max = match collection {
        Collection::LearningNotes => snapshot.learning_notes.iter().map(|n| n.id).max(),
        Collection::Cards => snapshot.cards.iter().map(|c| c.id).max(),
        Collection::ReviewLogs => snapshot.review_logs.iter().map(|l| l.id).max(),
    };
    max.map_or(1, |id| id + 1)
}
