//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the completion index.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    leaves_attempted INTEGER NOT NULL DEFAULT 0,
    leaves_succeeded INTEGER NOT NULL DEFAULT 0,
    leaves_skipped INTEGER NOT NULL DEFAULT 0,
    leaves_failed INTEGER NOT NULL DEFAULT 0,
    leaves_not_found INTEGER NOT NULL DEFAULT 0,
    branches_failed INTEGER NOT NULL DEFAULT 0
);

-- One row per leaf whose artifact is durably written
CREATE TABLE IF NOT EXISTS completions (
    leaf_key TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_completions_run ON completions(run_id);

-- Failures per run, for targeted re-runs
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    node_key TEXT NOT NULL,
    level TEXT NOT NULL,
    kind TEXT NOT NULL,
    cause TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failures_run ON failures(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
