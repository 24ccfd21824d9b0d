//! Storage traits and error types
//!
//! This module defines the trait interface for completion index backends and
//! associated error types.

use crate::state::FailureRecord;
use crate::storage::{CompletionMarker, CompletionRecord, RunCounts, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during index operations
///
/// Any of these reaching the walker halts the run: continuing would silently
/// lose completion tracking.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt index row: {0}")]
    Corrupt(String),

    #[error("Index lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for completion index backends
///
/// Implementations are accessed through `DedupStore`, which provides the
/// mutual exclusion needed by concurrent walker tasks.
pub trait CompletionIndex {
    // ===== Run Management =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Gets the most recent run that reached a terminal status
    fn get_latest_finished_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Lists all runs, newest first
    fn list_runs(&self) -> StorageResult<Vec<RunRecord>>;

    /// Records a run's final status, counts and finish timestamp
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: &RunCounts,
    ) -> StorageResult<()>;

    // ===== Completion Markers =====

    /// Loads every completed leaf key
    fn load_completed_keys(&self) -> StorageResult<Vec<String>>;

    /// Inserts or replaces the completion marker for a leaf
    ///
    /// Callers must only invoke this after the leaf's artifact is durable.
    fn mark_complete(&mut self, leaf_key: &str, marker: &CompletionMarker) -> StorageResult<()>;

    /// Gets the completion row for a leaf
    fn get_completion(&self, leaf_key: &str) -> StorageResult<Option<CompletionRecord>>;

    /// Counts all completed leaves
    fn count_completions(&self) -> StorageResult<u64>;

    /// Counts completed leaves at or below a path prefix
    fn count_completions_under(&self, prefix: &str) -> StorageResult<u64>;

    // ===== Failure Tracking =====

    /// Stores the failures of a run
    fn record_failures(&mut self, run_id: i64, failures: &[FailureRecord]) -> StorageResult<()>;

    /// Gets the failures of a run
    fn get_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>>;
}
