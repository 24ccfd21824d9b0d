//! Concurrent dedup store
//!
//! Wraps a `SqliteIndex` so that walker tasks can ask "is this leaf already
//! done?" without touching SQLite on every check. The in-memory set is loaded
//! once at open and only grows after the index row is committed.

use crate::hierarchy::LeafKey;
use crate::storage::traits::{CompletionIndex, StorageError, StorageResult};
use crate::storage::{CompletionMarker, SqliteIndex};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, RwLock};

/// Completion index shared by every walker task
pub struct DedupStore {
    index: Mutex<SqliteIndex>,
    completed: RwLock<HashSet<String>>,
}

impl DedupStore {
    /// Opens the index at `path` and loads its completed keys
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::from_index(SqliteIndex::new(path)?)
    }

    /// Wraps an already opened index
    pub fn from_index(index: SqliteIndex) -> StorageResult<Self> {
        let keys = index.load_completed_keys()?;
        tracing::debug!("Loaded {} completion markers", keys.len());

        Ok(Self {
            index: Mutex::new(index),
            completed: RwLock::new(keys.into_iter().collect()),
        })
    }

    /// Returns true if a completion marker exists for the leaf
    pub fn is_complete(&self, key: &LeafKey) -> StorageResult<bool> {
        let completed = self
            .completed
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(completed.contains(key.as_str()))
    }

    /// Durably records a completion marker
    ///
    /// Must only be called after the leaf's artifact has been persisted. The
    /// in-memory set is updated only once the index row is committed, so a
    /// crash in between leaves the leaf eligible for refetch.
    pub fn mark_complete(&self, key: &LeafKey, marker: &CompletionMarker) -> StorageResult<()> {
        {
            let mut index = self.index.lock().map_err(|_| StorageError::LockPoisoned)?;
            index.mark_complete(key.as_str(), marker)?;
        }

        let mut completed = self
            .completed
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        completed.insert(key.as_str().to_string());
        Ok(())
    }

    /// Number of leaves with a completion marker
    pub fn completed_count(&self) -> StorageResult<usize> {
        let completed = self
            .completed
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(completed.len())
    }

    /// Runs `f` with exclusive access to the underlying index
    pub fn with_index<T>(
        &self,
        f: impl FnOnce(&mut SqliteIndex) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut index = self.index.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut index)
    }
}
