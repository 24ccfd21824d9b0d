//! Run tallies and the final run report

use crate::hierarchy::{LeafKey, Level};
use crate::state::{FailureKind, FailureRecord, RunState};
use crate::storage::RunCounts;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Live counters shared by every walker task
///
/// Counters are atomics; the failure and incomplete lists sit behind short
/// mutex sections that never span an await.
#[derive(Debug, Default)]
pub struct RunTally {
    leaves_attempted: AtomicU64,
    leaves_succeeded: AtomicU64,
    leaves_skipped: AtomicU64,
    leaves_failed: AtomicU64,
    leaves_not_found: AtomicU64,
    branches_listed: AtomicU64,
    branches_pruned: AtomicU64,
    branches_failed: AtomicU64,
    failures: Mutex<Vec<FailureRecord>>,
    incomplete: Mutex<Vec<FailureRecord>>,
    not_found: Mutex<Vec<LeafKey>>,
}

impl RunTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network fetch was issued for a leaf
    pub fn record_attempt(&self) {
        self.leaves_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// A leaf's artifact and completion marker were committed
    pub fn record_success(&self) {
        self.leaves_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// A leaf was already complete and was not fetched
    pub fn record_skipped(&self) {
        self.leaves_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A branch listing produced children
    pub fn record_listed(&self) {
        self.branches_listed.fetch_add(1, Ordering::Relaxed);
    }

    /// A branch listing was absent or empty
    pub fn record_pruned(&self) {
        self.branches_pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, failure: FailureRecord) {
        if failure.is_branch() {
            self.branches_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.leaves_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    /// A leaf document is absent at the source; not a failure
    pub fn record_not_found(&self, key: LeafKey) {
        self.leaves_not_found.fetch_add(1, Ordering::Relaxed);
        self.not_found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key);
    }

    /// A node was not processed because the run was cancelled
    pub fn record_incomplete(&self, key: LeafKey, level: Level) {
        self.incomplete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FailureRecord {
                key,
                level,
                kind: FailureKind::Incomplete,
                cause: "cancelled before processing".to_string(),
            });
    }

    pub fn counts(&self) -> RunCounts {
        RunCounts {
            leaves_attempted: self.leaves_attempted.load(Ordering::Relaxed),
            leaves_succeeded: self.leaves_succeeded.load(Ordering::Relaxed),
            leaves_skipped: self.leaves_skipped.load(Ordering::Relaxed),
            leaves_failed: self.leaves_failed.load(Ordering::Relaxed),
            leaves_not_found: self.leaves_not_found.load(Ordering::Relaxed),
            branches_failed: self.branches_failed.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of the failures recorded so far
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Failures plus incomplete nodes: everything a targeted re-run must revisit
    pub fn resumable(&self) -> Vec<FailureRecord> {
        let mut records = self.failures();
        records.extend(
            self.incomplete
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned(),
        );
        records
    }

    /// True if nothing failed and nothing was left unprocessed
    pub fn is_clean(&self) -> bool {
        let no_failures = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty();
        let no_incomplete = self
            .incomplete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty();
        no_failures && no_incomplete
    }

    /// Freezes the tally into the run report
    pub fn finalize(&self, run: RunInfo) -> RunSummary {
        let counts = self.counts();

        let mut failures = self.failures();
        failures.sort_by(|a, b| a.key.cmp(&b.key));

        let mut incomplete: Vec<LeafKey> = self
            .incomplete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|record| record.key.clone())
            .collect();
        incomplete.sort();

        let mut not_found = self
            .not_found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        not_found.sort();

        RunSummary {
            run_id: run.run_id,
            state: run.state,
            started_at: run.started_at,
            finished_at: Utc::now(),
            leaves_attempted: counts.leaves_attempted,
            leaves_succeeded: counts.leaves_succeeded,
            leaves_skipped: counts.leaves_skipped,
            leaves_failed: counts.leaves_failed,
            leaves_not_found: counts.leaves_not_found,
            not_found,
            branches_listed: self.branches_listed.load(Ordering::Relaxed),
            branches_pruned: self.branches_pruned.load(Ordering::Relaxed),
            branches_failed: counts.branches_failed,
            failures,
            incomplete,
            cancelled: run.cancelled,
            peak_in_flight: run.peak_in_flight,
        }
    }
}

/// Run-level facts supplied by the coordinator at finalization
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: i64,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub cancelled: bool,
    pub peak_in_flight: usize,
}

/// Immutable report of one harvest run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Leaves for which a network fetch was issued
    pub leaves_attempted: u64,
    pub leaves_succeeded: u64,

    /// Leaves skipped because a completion marker already existed
    pub leaves_skipped: u64,
    pub leaves_failed: u64,

    /// Leaves whose document the source does not have
    pub leaves_not_found: u64,
    pub not_found: Vec<LeafKey>,

    pub branches_listed: u64,
    /// Branches whose listing was absent or empty
    pub branches_pruned: u64,
    pub branches_failed: u64,

    /// Failed leaves and branches with causes, sorted by key
    pub failures: Vec<FailureRecord>,

    /// Nodes left unprocessed by cancellation; safe to resume
    pub incomplete: Vec<LeafKey>,

    pub cancelled: bool,

    /// Highest number of simultaneous fetches observed
    pub peak_in_flight: usize,
}

impl RunSummary {
    pub fn failed_keys(&self) -> Vec<&LeafKey> {
        self.failures.iter().map(|f| &f.key).collect()
    }

    pub fn counts(&self) -> RunCounts {
        RunCounts {
            leaves_attempted: self.leaves_attempted,
            leaves_succeeded: self.leaves_succeeded,
            leaves_skipped: self.leaves_skipped,
            leaves_failed: self.leaves_failed,
            leaves_not_found: self.leaves_not_found,
            branches_failed: self.branches_failed,
        }
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}
