//! Output module for artifacts and run reports
//!
//! This module handles:
//! - Atomic persistence of leaf documents in a path-addressable tree
//! - Live run tallies and the final `RunSummary`
//! - Statistics over the completion index

mod artifact;
pub mod stats;
mod summary;

pub use artifact::{ArtifactStore, ArtifactWriter, WriteError, ARTIFACT_EXTENSION};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use summary::{RunInfo, RunSummary, RunTally};
