//! Precinct-Harvest main entry point
//!
//! This is the command-line interface for the Precinct-Harvest election
//! results harvester.

use anyhow::Context;
use clap::Parser;
use precinct_harvest::config::{load_config_with_hash, validate, Config};
use precinct_harvest::crawler::RunCoordinator;
use precinct_harvest::output::{load_statistics, print_statistics, RunSummary};
use precinct_harvest::storage::SqliteIndex;
use precinct_harvest::RunState;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Precinct-Harvest: a resumable election results harvester
///
/// Walks the region → province → municipality → barangay → precinct
/// hierarchy (and the overseas tree), storing every precinct document as a
/// JSON file. Interrupted runs resume without refetching completed precincts.
#[derive(Parser, Debug)]
#[command(name = "precinct-harvest")]
#[command(version)]
#[command(about = "A resumable election results harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Refetch precincts even if they are already stored
    #[arg(long)]
    force_refresh: bool,

    /// Restrict the run to these root codes
    #[arg(long, value_name = "CODE", num_args = 1..)]
    only: Vec<String>,

    /// Re-walk only the failures of the most recent finished run
    #[arg(long, conflicts_with = "only")]
    retry_failed: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long, conflicts_with_all = ["stats", "retry_failed"])]
    dry_run: bool,

    /// Show statistics from the completion index and exit
    #[arg(long, conflicts_with_all = ["dry_run", "retry_failed"])]
    stats: bool,

    /// Write the run report as JSON to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Command-line overrides
    if cli.force_refresh {
        config.harvester.force_refresh = true;
    }
    if !cli.only.is_empty() {
        config.scope.only = cli.only.clone();
    }
    validate(&config).context("Invalid configuration")?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(ExitCode::SUCCESS);
    }
    if cli.stats {
        handle_stats(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let summary = handle_harvest(config, config_hash, cli.retry_failed).await?;

    print_summary(&summary);
    if let Some(path) = &cli.report {
        write_report(&summary, path)?;
        println!("✓ Report written to: {}", path.display());
    }

    Ok(match summary.state {
        RunState::Completed => ExitCode::SUCCESS,
        _ => ExitCode::from(2),
    })
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("precinct_harvest=info,warn"),
            1 => EnvFilter::new("precinct_harvest=debug,info"),
            2 => EnvFilter::new("precinct_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config) {
    println!("=== Precinct-Harvest Dry Run ===\n");

    println!("Harvester Configuration:");
    println!(
        "  Max concurrent requests: {}",
        config.harvester.max_concurrent_requests
    );
    println!("  Request timeout: {}ms", config.harvester.request_timeout_ms);
    println!("  Max attempts: {}", config.harvester.max_attempts);
    println!(
        "  Backoff: {}ms base, {}ms max, {}ms jitter",
        config.harvester.backoff_base_ms,
        config.harvester.backoff_max_ms,
        config.harvester.backoff_jitter_ms
    );
    println!("  Force refresh: {}", config.harvester.force_refresh);
    if let Some(secs) = config.harvester.run_deadline_secs {
        println!("  Run deadline: {}s", secs);
    }

    println!("\nSource:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  User agent: {}", config.source.user_agent);

    println!("\nOutput:");
    println!("  Artifacts: {}", config.output.artifact_dir);
    println!("  Index: {}", config.output.index_path);

    let scope = &config.scope;
    let selected = |code: &String| scope.only.is_empty() || scope.only.contains(code);
    for tree in &scope.trees {
        let codes = match tree {
            precinct_harvest::TreeKind::Local => &scope.regions,
            precinct_harvest::TreeKind::Overseas => &scope.overseas_roots,
        };
        let codes: Vec<_> = codes.iter().filter(|c| selected(c)).collect();
        println!("\n{} roots ({}):", tree, codes.len());
        for code in codes {
            println!("  - {}", code);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the completion index
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Index: {}\n", config.output.index_path);

    let index = SqliteIndex::new(Path::new(&config.output.index_path))
        .context("Failed to open completion index")?;
    index
        .check_integrity()
        .context("Completion index failed its integrity check")?;

    let roots: Vec<String> = config
        .scope
        .regions
        .iter()
        .chain(&config.scope.overseas_roots)
        .cloned()
        .collect();
    let stats = load_statistics(&index, &roots)?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    retry_failed: bool,
) -> anyhow::Result<RunSummary> {
    let mut coordinator =
        RunCoordinator::new(config, config_hash).context("Failed to start harvest")?;

    // Ctrl-C stops new requests; in-flight ones finish and the run is recorded
    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            cancel.cancel();
        }
    });

    let result = if retry_failed {
        coordinator.retry_failed().await
    } else {
        coordinator.run().await
    };

    match result {
        Ok(summary) => Ok(summary),
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Run {} {} ===\n", summary.run_id, summary.state);
    println!("  Duration: {}s", summary.duration_seconds());
    println!("  Precincts attempted: {}", summary.leaves_attempted);
    println!("  Precincts stored: {}", summary.leaves_succeeded);
    println!("  Precincts skipped (already stored): {}", summary.leaves_skipped);
    println!("  Precincts failed: {}", summary.leaves_failed);
    println!("  Precincts not found at source: {}", summary.leaves_not_found);
    println!("  Branches failed: {}", summary.branches_failed);
    println!("  Peak concurrent requests: {}", summary.peak_in_flight);

    if !summary.failures.is_empty() {
        println!("\nFailures ({}):", summary.failures.len());
        for failure in &summary.failures {
            println!(
                "  - {} [{} {}] {}",
                failure.key, failure.level, failure.kind, failure.cause
            );
        }
    }

    if summary.cancelled {
        println!(
            "\nRun was cancelled; {} node(s) left unprocessed. Re-run or use --retry-failed to resume.",
            summary.incomplete.len()
        );
    }
}

fn write_report(summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}
