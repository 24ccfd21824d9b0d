//! Precinct-Harvest: a concurrent hierarchical harvester for election results
//!
//! This crate walks a geographic hierarchy (region → province → municipality →
//! barangay → precinct, plus the overseas tree) published by a remote JSON
//! source, fetches every precinct document under a global concurrency ceiling,
//! and persists each one as an individually addressable artifact. A SQLite
//! completion index makes interrupted runs resumable without refetching.

pub mod config;
pub mod crawler;
pub mod endpoint;
pub mod hierarchy;
pub mod output;
pub mod state;
pub mod storage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harvest operations
///
/// Only startup problems and the exhaustion of the backing storage surface
/// here. Per-node fetch, validation and write failures are recorded in the
/// run summary instead of aborting the run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Completion index error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Storage exhausted while writing {path}: {source}")]
    StorageExhausted {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Endpoint error: {0}")]
    Endpoint(#[from] endpoint::EndpointError),

    #[error("Invalid hierarchy node: {0}")]
    Hierarchy(String),

    #[error("Invalid run state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunState,
        to: state::RunState,
    },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL template: {0}")]
    InvalidTemplate(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{HttpFetcher, RunCoordinator};
pub use hierarchy::{HierarchyNode, LeafKey, Level, TreeKind};
pub use output::RunSummary;
pub use state::{FailureKind, RunState};
