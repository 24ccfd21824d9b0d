//! Statistics generation from the completion index
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::state::FailureRecord;
use crate::storage::{CompletionIndex, RunRecord, StorageResult};

/// Completion index statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of leaves with a completion marker
    pub total_completions: u64,

    /// Completed leaves per root code, in the order requested
    pub completions_by_root: Vec<(String, u64)>,

    /// Number of runs recorded
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Failures recorded by the most recent run
    pub latest_failures: Vec<FailureRecord>,
}

/// Loads statistics from the index
///
/// # Arguments
///
/// * `index` - The completion index to query
/// * `roots` - Root codes to break completions down by
pub fn load_statistics(
    index: &dyn CompletionIndex,
    roots: &[String],
) -> StorageResult<HarvestStatistics> {
    let total_completions = index.count_completions()?;

    let completions_by_root = roots
        .iter()
        .map(|root| -> StorageResult<(String, u64)> {
            Ok((root.clone(), index.count_completions_under(root)?))
        })
        .collect::<StorageResult<Vec<_>>>()?;

    let runs = index.list_runs()?;
    let latest_run = runs.first().cloned();
    let latest_failures = match &latest_run {
        Some(run) => index.get_failures(run.id)?,
        None => Vec::new(),
    };

    Ok(HarvestStatistics {
        total_completions,
        completions_by_root,
        total_runs: runs.len() as u64,
        latest_run,
        latest_failures,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Completed precincts: {}", stats.total_completions);
    println!("  Runs recorded: {}", stats.total_runs);
    println!();

    let nonzero: Vec<_> = stats
        .completions_by_root
        .iter()
        .filter(|(_, count)| *count > 0)
        .collect();
    if !nonzero.is_empty() {
        println!("Completed by Root:");
        for (root, count) in nonzero {
            let percentage = if stats.total_completions > 0 {
                (*count as f64 / stats.total_completions as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", root, count, percentage);
        }
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!("Latest Run (#{}):", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Leaves: {} attempted, {} succeeded, {} skipped, {} failed, {} not found",
            run.counts.leaves_attempted,
            run.counts.leaves_succeeded,
            run.counts.leaves_skipped,
            run.counts.leaves_failed,
            run.counts.leaves_not_found
        );
        println!("  Failed branches: {}", run.counts.branches_failed);
        println!();
    }

    if !stats.latest_failures.is_empty() {
        println!("Failures ({}):", stats.latest_failures.len());
        for failure in &stats.latest_failures {
            println!("  - {} [{}] {}", failure.key, failure.kind, failure.cause);
        }
        println!();
    }
}
