//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CompletionIndex trait.

use crate::hierarchy::{LeafKey, Level};
use crate::state::{FailureKind, FailureRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CompletionIndex, StorageError, StorageResult};
use crate::storage::{CompletionMarker, CompletionRecord, RunCounts, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status,
     leaves_attempted, leaves_succeeded, leaves_skipped, leaves_failed, leaves_not_found,
     branches_failed";

/// SQLite completion index
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Opens or creates the index at `path`
    ///
    /// Missing parent directories are created.
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers unblocked; FULL sync makes each marker durable
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory index (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs SQLite's integrity check
    pub fn check_integrity(&self) -> StorageResult<()> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if result == "ok" {
            Ok(())
        } else {
            Err(StorageError::Corrupt(result))
        }
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        counts: RunCounts {
            leaves_attempted: row.get::<_, i64>(5)? as u64,
            leaves_succeeded: row.get::<_, i64>(6)? as u64,
            leaves_skipped: row.get::<_, i64>(7)? as u64,
            leaves_failed: row.get::<_, i64>(8)? as u64,
            leaves_not_found: row.get::<_, i64>(9)? as u64,
            branches_failed: row.get::<_, i64>(10)? as u64,
        },
    })
}

impl CompletionIndex for SqliteIndex {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn get_latest_finished_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM runs WHERE status != ?1 ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(&sql, params![RunStatus::Running.to_db_string()], run_from_row)
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: &RunCounts,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, leaves_attempted = ?3,
             leaves_succeeded = ?4, leaves_skipped = ?5, leaves_failed = ?6,
             leaves_not_found = ?7, branches_failed = ?8 WHERE id = ?9",
            params![
                status.to_db_string(),
                now,
                counts.leaves_attempted as i64,
                counts.leaves_succeeded as i64,
                counts.leaves_skipped as i64,
                counts.leaves_failed as i64,
                counts.leaves_not_found as i64,
                counts.branches_failed as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Completion Markers =====

    fn load_completed_keys(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT leaf_key FROM completions")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn mark_complete(&mut self, leaf_key: &str, marker: &CompletionMarker) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO completions (leaf_key, content_hash, completed_at, run_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(leaf_key) DO UPDATE SET
                content_hash = excluded.content_hash,
                completed_at = excluded.completed_at,
                run_id = excluded.run_id",
            params![leaf_key, marker.content_hash, now, marker.run_id],
        )?;
        Ok(())
    }

    fn get_completion(&self, leaf_key: &str) -> StorageResult<Option<CompletionRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT leaf_key, content_hash, completed_at, run_id
                 FROM completions WHERE leaf_key = ?1",
                params![leaf_key],
                |row| {
                    Ok(CompletionRecord {
                        leaf_key: row.get(0)?,
                        content_hash: row.get(1)?,
                        completed_at: row.get(2)?,
                        run_id: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn count_completions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM completions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_completions_under(&self, prefix: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM completions
             WHERE leaf_key = ?1 OR substr(leaf_key, 1, length(?1) + 1) = ?1 || '/'",
            params![prefix],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Failure Tracking =====

    fn record_failures(&mut self, run_id: i64, failures: &[FailureRecord]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO failures (run_id, node_key, level, kind, cause, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for failure in failures {
                stmt.execute(params![
                    run_id,
                    failure.key.as_str(),
                    failure.level.to_db_string(),
                    failure.kind.to_db_string(),
                    failure.cause,
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_failures(&self, run_id: i64) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT node_key, level, kind, cause FROM failures WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, level, kind, cause)| -> StorageResult<FailureRecord> {
                Ok(FailureRecord {
                    key: LeafKey::parse(&key)
                        .ok_or_else(|| StorageError::Corrupt(format!("node key '{}'", key)))?,
                    level: Level::from_db_string(&level)
                        .ok_or_else(|| StorageError::Corrupt(format!("level '{}'", level)))?,
                    kind: FailureKind::from_db_string(&kind)
                        .ok_or_else(|| StorageError::Corrupt(format!("failure kind '{}'", kind)))?,
                    cause,
                })
            })
            .collect()
    }
}
