//! Storage module for persisting completion state
//!
//! This module handles all index operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Completion markers for leaves whose artifacts are durably written
//! - Run tracking and per-run failure lists for targeted re-runs
//! - The concurrent `DedupStore` consulted before every leaf fetch

mod dedup;
mod schema;
mod sqlite;
mod traits;

pub use dedup::DedupStore;
pub use sqlite::SqliteIndex;
pub use traits::{CompletionIndex, StorageError, StorageResult};

use crate::state::RunState;

/// Marker written when a leaf's artifact has been committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMarker {
    /// SHA-256 of the stored document
    pub content_hash: String,

    /// Run that wrote the artifact
    pub run_id: i64,
}

/// A completion row as stored in the index
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub leaf_key: String,
    pub content_hash: String,
    pub completed_at: String,
    pub run_id: i64,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counts: RunCounts,
}

/// Leaf and branch totals stored with a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub leaves_attempted: u64,
    pub leaves_succeeded: u64,
    pub leaves_skipped: u64,
    pub leaves_failed: u64,
    pub leaves_not_found: u64,
    pub branches_failed: u64,
}

/// Status of a run as persisted in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    PartiallyFailed,
    /// Halted on storage exhaustion or index corruption
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially_failed",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partially_failed" => Some(Self::PartiallyFailed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

impl From<RunState> for RunStatus {
    fn from(state: RunState) -> Self {
        match state {
            RunState::Idle | RunState::Running => Self::Running,
            RunState::Completed => Self::Completed,
            RunState::PartiallyFailed => Self::PartiallyFailed,
        }
    }
}
