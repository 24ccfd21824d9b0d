//! Run coordinator - main harvest orchestration logic
//!
//! This module drives a run from start to finish:
//! - Opening the completion index and recording the run
//! - Selecting roots (full hierarchy, a subset, or last run's failures)
//! - Walking every root concurrently under the global limiter
//! - Cancellation by handle or deadline
//! - Persisting the final status, counts and failure list

use crate::config::{validate, Config};
use crate::crawler::fetcher::{Fetch, HttpFetcher};
use crate::crawler::limiter::{CancelHandle, ConcurrencyLimiter};
use crate::crawler::walker::TreeWalker;
use crate::endpoint::EndpointTemplates;
use crate::hierarchy::{HierarchyNode, LeafKey, TreeKind};
use crate::output::{ArtifactStore, ArtifactWriter, RunInfo, RunSummary, RunTally};
use crate::state::RunState;
use crate::storage::{CompletionIndex, DedupStore, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Main harvest coordinator structure
///
/// A coordinator drives exactly one run; its state machine moves
/// `Idle → Running → {Completed, PartiallyFailed}` and never back.
pub struct RunCoordinator<F> {
    config: Arc<Config>,
    config_hash: String,
    fetcher: Arc<F>,
    limiter: Arc<ConcurrencyLimiter>,
    dedup: Arc<DedupStore>,
    writer: Arc<ArtifactWriter>,
    store: Arc<dyn ArtifactStore>,
    templates: EndpointTemplates,
    state: RunState,
}

impl RunCoordinator<HttpFetcher> {
    /// Creates a coordinator that fetches over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(RunCoordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Invalid config or index could not be opened
    pub fn new(config: Config, config_hash: String) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, config_hash, fetcher)
    }
}

impl<F: Fetch> RunCoordinator<F> {
    /// Creates a coordinator with a custom document source
    pub fn with_fetcher(
        config: Config,
        config_hash: String,
        fetcher: F,
    ) -> Result<Self, HarvestError> {
        validate(&config)?;

        let dedup = DedupStore::open(Path::new(&config.output.index_path))?;
        tracing::info!(
            "Completion index {} holds {} completed precincts",
            config.output.index_path,
            dedup.completed_count()?
        );

        let limiter = ConcurrencyLimiter::new(config.harvester.max_concurrent_requests as usize);
        let writer = Arc::new(ArtifactWriter::new(&config.output.artifact_dir));
        let templates = EndpointTemplates::from_config(&config.source);

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            fetcher: Arc::new(fetcher),
            limiter: Arc::new(limiter),
            dedup: Arc::new(dedup),
            store: writer.clone(),
            writer,
            templates,
            state: RunState::Idle,
        })
    }

    /// Handle that cancels the run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(Arc::clone(&self.limiter))
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Root nodes selected by the scope configuration
    ///
    /// Trees are taken in configured order; within a tree, roots keep their
    /// configured order. `only` restricts the set when non-empty.
    pub fn roots(&self) -> Result<Vec<HierarchyNode>, HarvestError> {
        let scope = &self.config.scope;
        let mut roots: Vec<HierarchyNode> = Vec::new();

        for tree in &scope.trees {
            let codes = match tree {
                TreeKind::Local => &scope.regions,
                TreeKind::Overseas => &scope.overseas_roots,
            };
            for code in codes {
                if !scope.only.is_empty() && !scope.only.contains(code) {
                    continue;
                }
                if roots.iter().any(|root| &root.code == code) {
                    continue;
                }
                roots.push(HierarchyNode::root(tree.root_level(), code, code)?);
            }
        }

        Ok(roots)
    }

    /// Walks every selected root
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let roots = self.roots()?;
        tracing::info!("Harvesting {} root(s)", roots.len());
        self.execute(roots).await
    }

    /// Re-walks only what failed or was left incomplete in the most recent
    /// finished run
    ///
    /// Branch keys re-walk their subtree; leaf keys refetch one leaf. Keys
    /// nested under another recorded branch are folded into it.
    pub async fn retry_failed(&mut self) -> Result<RunSummary, HarvestError> {
        let previous = self.dedup.with_index(|index| index.get_latest_finished_run())?;

        let nodes = match previous {
            Some(run) => {
                let failures = self.dedup.with_index(|index| index.get_failures(run.id))?;
                tracing::info!(
                    "Retrying {} failed or incomplete node(s) from run {} ({})",
                    failures.len(),
                    run.id,
                    run.status.to_db_string()
                );

                let mut failures = failures;
                failures.sort_by_key(|f| f.key.depth());

                let mut kept: Vec<LeafKey> = Vec::new();
                let mut nodes = Vec::new();
                for failure in failures {
                    if kept.iter().any(|k| failure.key.starts_with(k)) {
                        continue;
                    }
                    nodes.push(HierarchyNode::from_key(&failure.key, failure.level)?);
                    kept.push(failure.key);
                }
                nodes
            }
            None => {
                tracing::info!("No finished run to retry");
                Vec::new()
            }
        };

        self.execute(nodes).await
    }

    async fn execute(&mut self, roots: Vec<HierarchyNode>) -> Result<RunSummary, HarvestError> {
        self.state = self.state.start()?;
        let started_at = Utc::now();

        let run_id = self
            .dedup
            .with_index(|index| index.create_run(&self.config_hash))?;
        tracing::info!(
            "Starting run {} (max {} concurrent requests)",
            run_id,
            self.limiter.capacity()
        );

        let tally = Arc::new(RunTally::new());
        let walker = TreeWalker::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.limiter),
            Arc::clone(&self.dedup),
            Arc::clone(&self.store),
            self.templates.clone(),
            Arc::clone(&tally),
            run_id,
        )
        .with_force_refresh(self.config.harvester.force_refresh)
        .with_leaf_pointer(self.leaf_pointer());

        let deadline = self.config.harvester.run_deadline_secs.map(|secs| {
            let handle = self.cancel_handle();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!("Run deadline of {}s reached", secs);
                handle.cancel();
            })
        });

        let outcome = try_join_all(roots.into_iter().map(|root| walker.walk(root))).await;

        if let Some(task) = deadline {
            task.abort();
        }

        if let Err(fatal) = outcome {
            tracing::error!("Run {} halted: {}", run_id, fatal);
            self.limiter.close();
            self.abort_run(run_id, &tally);
            return Err(fatal);
        }

        let cancelled = self.limiter.is_closed();
        self.state = self.state.finish(tally.is_clean() && !cancelled)?;

        let summary = tally.finalize(RunInfo {
            run_id,
            state: self.state,
            started_at,
            cancelled,
            peak_in_flight: self.limiter.peak(),
        });

        let status = RunStatus::from(self.state);
        let resumable = tally.resumable();
        self.dedup.with_index(|index| {
            index.record_failures(run_id, &resumable)?;
            index.finish_run(run_id, status, &summary.counts())
        })?;

        tracing::info!(
            "Run {} {}: {} succeeded, {} skipped, {} failed leaves, {} failed branches",
            run_id,
            self.state,
            summary.leaves_succeeded,
            summary.leaves_skipped,
            summary.leaves_failed,
            summary.branches_failed
        );

        Ok(summary)
    }

    /// Best-effort record of a halted run; the original error wins
    fn abort_run(&self, run_id: i64, tally: &RunTally) {
        let failures = tally.resumable();
        let counts = tally.counts();
        let result = self.dedup.with_index(|index| {
            index.record_failures(run_id, &failures)?;
            index.finish_run(run_id, RunStatus::Aborted, &counts)
        });
        if let Err(e) = result {
            tracing::error!("Could not record aborted run {}: {}", run_id, e);
        }
    }

    fn leaf_pointer(&self) -> Option<String> {
        let pointer = &self.config.source.leaf_required_pointer;
        (!pointer.is_empty()).then(|| pointer.clone())
    }
}

/// Runs a complete harvest over HTTP
///
/// # Example
///
/// ```no_run
/// use precinct_harvest::config::load_config_with_hash;
/// use precinct_harvest::crawler::harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = harvest(config, hash).await?;
/// println!("{} precincts stored", summary.leaves_succeeded);
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: Config, config_hash: String) -> Result<RunSummary, HarvestError> {
    let mut coordinator = RunCoordinator::new(config, config_hash)?;
    coordinator.run().await
}
