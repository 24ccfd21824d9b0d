//! Full-run tests against the synthetic hierarchy source

use crate::synthetic::{
    leaf_path, local_path, CancelAfter, Reply, SyntheticSource, BASE_URL,
};
use precinct_harvest::config::Config;
use precinct_harvest::crawler::RunCoordinator;
use precinct_harvest::hierarchy::{LeafKey, Level, TreeKind};
use precinct_harvest::output::ArtifactWriter;
use precinct_harvest::state::{FailureKind, RunState};
use precinct_harvest::storage::{CompletionIndex, RunStatus};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Creates a test configuration rooted in `dir` with the given region roots
fn create_test_config(dir: &TempDir, regions: Vec<String>) -> Config {
    let mut config = Config::default();
    config.source.base_url = BASE_URL.to_string();
    config.harvester.max_concurrent_requests = 4;
    config.harvester.request_delay_ms = 0;
    config.output.artifact_dir = dir.path().join("data").to_string_lossy().into_owned();
    config.output.index_path = dir.path().join("harvest.db").to_string_lossy().into_owned();
    config.scope.trees = vec![TreeKind::Local];
    config.scope.regions = regions;
    config.scope.overseas_roots = vec![];
    config
}

fn coordinator(config: Config, source: SyntheticSource) -> RunCoordinator<SyntheticSource> {
    RunCoordinator::with_fetcher(config, "test-hash".to_string(), source)
        .expect("Failed to create coordinator")
}

/// Every artifact below the configured roots
fn stored_leaves(config: &Config) -> Vec<LeafKey> {
    let writer = ArtifactWriter::new(&config.output.artifact_dir);
    config
        .scope
        .regions
        .iter()
        .flat_map(|r| writer.list_under(&LeafKey::parse(r).unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_complete_run_writes_every_leaf() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, SyntheticSource::region_codes(2));

    // 2 regions × 3 provinces × 1 × 1 × 2 precincts = 12 leaves
    let source = SyntheticSource::tree(2, 3, 1, 1, 2);
    let stats = source.stats();
    let mut coordinator = coordinator(config.clone(), source);

    let summary = coordinator.run().await.expect("Run failed");

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(coordinator.state(), RunState::Completed);
    assert_eq!(summary.leaves_attempted, 12);
    assert_eq!(summary.leaves_succeeded, 12);
    assert_eq!(summary.leaves_skipped, 0);
    assert!(summary.failures.is_empty());
    assert!(!summary.cancelled);

    assert_eq!(stats.leaf_calls(), 12);
    // 2 regions + 6 provinces + 6 municipalities + 6 barangays
    assert_eq!(stats.listing_calls(), 20);
    assert_eq!(stored_leaves(&config).len(), 12);
    assert_eq!(coordinator.dedup().completed_count().unwrap(), 12);

    // The run record carries the final status and counts
    let run = coordinator
        .dedup()
        .with_index(|index| index.get_run(summary.run_id))
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counts.leaves_succeeded, 12);
    assert_eq!(run.config_hash, "test-hash");

    // Artifacts are the fetched documents
    let key = LeafKey::parse("R1/R1P2/R1P2M1/R1P2M1B1/R1P2M1B1X2").unwrap();
    let path = coordinator.writer().path_for(&key);
    let stored: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(stored["information"]["precinctId"], "R1P2M1B1X2");
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, SyntheticSource::region_codes(2));

    let first = coordinator(config.clone(), SyntheticSource::tree(2, 3, 1, 1, 2))
        .run()
        .await
        .unwrap();
    assert_eq!(first.leaves_succeeded, 12);

    let source = SyntheticSource::tree(2, 3, 1, 1, 2);
    let stats = source.stats();
    let second = coordinator(config.clone(), source).run().await.unwrap();

    assert_eq!(second.state, RunState::Completed);
    assert_eq!(second.leaves_skipped, 12);
    assert_eq!(second.leaves_attempted, 0);
    assert_eq!(stats.leaf_calls(), 0);
    assert_eq!(stored_leaves(&config).len(), 12);
}

#[tokio::test]
async fn test_force_refresh_refetches_completed_leaves() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, SyntheticSource::region_codes(1));

    coordinator(config.clone(), SyntheticSource::tree(1, 2, 1, 1, 2))
        .run()
        .await
        .unwrap();

    config.harvester.force_refresh = true;
    let source = SyntheticSource::tree(1, 2, 1, 1, 2);
    let stats = source.stats();
    let summary = coordinator(config.clone(), source).run().await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.leaves_skipped, 0);
    assert_eq!(summary.leaves_succeeded, 4);
    assert_eq!(stats.leaf_calls(), 4);
    assert_eq!(stored_leaves(&config).len(), 4);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_ceiling() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, SyntheticSource::region_codes(2));
    config.harvester.max_concurrent_requests = 3;

    // 60 precincts under one barangay: fan-out far above the ceiling
    let source = SyntheticSource::tree(2, 1, 1, 1, 60).with_delay(Duration::from_millis(5));
    let stats = source.stats();
    let mut coordinator = coordinator(config, source);

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.leaves_succeeded, 120);
    assert!(stats.peak() <= 3, "peak {} exceeded ceiling", stats.peak());
    assert!(stats.peak() > 1, "fetches never overlapped");
    assert!(summary.peak_in_flight <= 3);
    assert_eq!(coordinator.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_failed_province_is_isolated() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, SyntheticSource::region_codes(2));

    let source = SyntheticSource::tree(2, 3, 1, 1, 2).with_reply(local_path("R1P2"), Reply::Permanent);
    let summary = coordinator(config.clone(), source).run().await.unwrap();

    assert_eq!(summary.state, RunState::PartiallyFailed);
    assert_eq!(summary.branches_failed, 1);
    assert_eq!(summary.leaves_failed, 0);
    assert_eq!(summary.leaves_succeeded, 10);

    let failure = &summary.failures[0];
    assert_eq!(failure.key.as_str(), "R1/R1P2");
    assert_eq!(failure.level, Level::Province);
    assert_eq!(failure.kind, FailureKind::Permanent);

    // Every other province is fully written
    let stored = stored_leaves(&config);
    assert_eq!(stored.len(), 10);
    let failed_prefix = LeafKey::parse("R1/R1P2").unwrap();
    assert!(stored.iter().all(|k| !k.starts_with(&failed_prefix)));
}

#[tokio::test]
async fn test_leaf_failures_are_classified() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, SyntheticSource::region_codes(1));
    config.source.leaf_required_pointer = "/information/location".to_string();

    let source = SyntheticSource::tree(1, 1, 1, 1, 4)
        .with_reply(leaf_path("R1P1M1B1X1"), Reply::Transient)
        .with_reply(leaf_path("R1P1M1B1X2"), Reply::NotFound)
        .with_reply(
            leaf_path("R1P1M1B1X3"),
            Reply::Json(serde_json::json!({"information": {}})),
        );
    let summary = coordinator(config.clone(), source).run().await.unwrap();

    assert_eq!(summary.state, RunState::PartiallyFailed);
    assert_eq!(summary.leaves_attempted, 4);
    assert_eq!(summary.leaves_succeeded, 1);
    assert_eq!(summary.leaves_failed, 2);
    assert_eq!(summary.leaves_not_found, 1);
    assert_eq!(summary.not_found[0].as_str(), "R1/R1P1/R1P1M1/R1P1M1B1/R1P1M1B1X2");

    let kinds: Vec<_> = summary.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FailureKind::Transient, FailureKind::Permanent]);

    // Only the valid leaf is stored and marked complete
    assert_eq!(stored_leaves(&config).len(), 1);
}

#[tokio::test]
async fn test_missing_leaf_is_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, SyntheticSource::region_codes(1));

    let source =
        SyntheticSource::tree(1, 1, 1, 1, 3).with_reply(leaf_path("R1P1M1B1X3"), Reply::NotFound);
    let mut coordinator = coordinator(config.clone(), source);
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.leaves_succeeded, 2);
    assert_eq!(summary.leaves_not_found, 1);
    assert!(summary.failures.is_empty());

    let run = coordinator
        .dedup()
        .with_index(|index| index.get_run(summary.run_id))
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counts.leaves_not_found, 1);
}

#[tokio::test]
async fn test_blocked_artifact_path_is_a_storage_failure() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, SyntheticSource::region_codes(1));

    // A plain file where the region directory must go
    let data = std::path::Path::new(&config.output.artifact_dir);
    std::fs::create_dir_all(data).unwrap();
    std::fs::write(data.join("R1"), b"not a directory").unwrap();

    let mut coordinator = coordinator(config.clone(), SyntheticSource::tree(1, 1, 1, 1, 2));
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.state, RunState::PartiallyFailed);
    assert_eq!(summary.leaves_attempted, 2);
    assert_eq!(summary.leaves_succeeded, 0);
    assert_eq!(summary.leaves_failed, 2);
    assert!(summary
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::Storage && f.level == Level::Precinct));

    // Nothing was marked complete, so the next run refetches both leaves
    assert_eq!(coordinator.dedup().completed_count().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_listing_prunes_branch() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, SyntheticSource::region_codes(2));

    let source = SyntheticSource::tree(2, 1, 1, 1, 2).with_reply(local_path("R2"), Reply::NotFound);
    let summary = coordinator(config, source).run().await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.branches_pruned, 1);
    assert_eq!(summary.leaves_succeeded, 2);
}

#[tokio::test]
async fn test_cancelled_run_resumes_without_refetch() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, SyntheticSource::region_codes(2));
    config.harvester.max_concurrent_requests = 2;

    let slot = Arc::new(Mutex::new(None));
    let source = SyntheticSource::tree(2, 3, 1, 1, 2).with_cancel_after(CancelAfter {
        leaves: 3,
        handle: Arc::clone(&slot),
    });
    let mut first = coordinator(config.clone(), source);
    *slot.lock().unwrap() = Some(first.cancel_handle());

    let interrupted = first.run().await.unwrap();

    assert!(interrupted.cancelled);
    assert_eq!(interrupted.state, RunState::PartiallyFailed);
    assert!(!interrupted.incomplete.is_empty());
    assert!(interrupted.leaves_succeeded < 12);

    // Everything stored so far is a complete document and is marked complete
    let stored = stored_leaves(&config);
    assert_eq!(stored.len() as u64, interrupted.leaves_succeeded);
    for key in &stored {
        let path = first.writer().path_for(key);
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(doc["information"]["location"].is_string());
        assert!(first.dedup().is_complete(key).unwrap());
    }
    drop(first);

    let source = SyntheticSource::tree(2, 3, 1, 1, 2);
    let stats = source.stats();
    let resumed = coordinator(config.clone(), source).run().await.unwrap();

    assert_eq!(resumed.state, RunState::Completed);
    assert_eq!(resumed.leaves_skipped, interrupted.leaves_succeeded);
    assert_eq!(stats.leaf_calls() as u64, 12 - interrupted.leaves_succeeded);
    assert_eq!(stored_leaves(&config).len(), 12);
}

#[tokio::test]
async fn test_retry_failed_refetches_only_failures() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, SyntheticSource::region_codes(2));

    let source = SyntheticSource::tree(2, 2, 1, 1, 2)
        .with_reply(local_path("R2P1"), Reply::Transient)
        .with_reply(leaf_path("R1P1M1B1X2"), Reply::Permanent);
    let first = coordinator(config.clone(), source).run().await.unwrap();
    assert_eq!(first.state, RunState::PartiallyFailed);
    assert_eq!(first.failures.len(), 2);

    // The source has recovered
    let source = SyntheticSource::tree(2, 2, 1, 1, 2);
    let stats = source.stats();
    let mut retry = coordinator(config.clone(), source);
    let summary = retry.retry_failed().await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    // One leaf plus the two precincts below the recovered province
    assert_eq!(summary.leaves_succeeded, 3);
    assert_eq!(stats.leaf_calls(), 3);
    assert_eq!(stats.calls_to(&local_path("R1")), 0);
    assert_eq!(stats.calls_to(&local_path("R2P1")), 1);
    assert_eq!(stored_leaves(&config).len(), 8);

    let run = retry
        .dedup()
        .with_index(|index| index.get_latest_run())
        .unwrap()
        .unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_retry_failed_resumes_cancelled_run() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, SyntheticSource::region_codes(2));
    config.harvester.max_concurrent_requests = 2;

    let slot = Arc::new(Mutex::new(None));
    let source = SyntheticSource::tree(2, 3, 1, 1, 2).with_cancel_after(CancelAfter {
        leaves: 3,
        handle: Arc::clone(&slot),
    });
    let mut first = coordinator(config.clone(), source);
    *slot.lock().unwrap() = Some(first.cancel_handle());

    let interrupted = first.run().await.unwrap();
    assert!(interrupted.cancelled);
    assert!(!interrupted.incomplete.is_empty());

    // Unstarted nodes are stored with the run
    let stored_incomplete = first
        .dedup()
        .with_index(|index| index.get_failures(interrupted.run_id))
        .unwrap()
        .into_iter()
        .filter(|f| f.kind == FailureKind::Incomplete)
        .count();
    assert_eq!(stored_incomplete, interrupted.incomplete.len());
    drop(first);

    let source = SyntheticSource::tree(2, 3, 1, 1, 2);
    let stats = source.stats();
    let summary = coordinator(config.clone(), source)
        .retry_failed()
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(
        summary.leaves_succeeded + interrupted.leaves_succeeded,
        12,
        "retry must cover every leaf the cancelled run left behind"
    );
    assert_eq!(stats.leaf_calls() as u64, 12 - interrupted.leaves_succeeded);
    assert_eq!(stored_leaves(&config).len(), 12);
}

#[tokio::test]
async fn test_deadline_cancels_run() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, SyntheticSource::region_codes(1));
    config.harvester.max_concurrent_requests = 1;
    config.harvester.run_deadline_secs = Some(1);

    let source = SyntheticSource::tree(1, 1, 1, 1, 50).with_delay(Duration::from_millis(100));
    let summary = coordinator(config, source).run().await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.state, RunState::PartiallyFailed);
    assert!(summary.leaves_succeeded < 50);
    assert!(!summary.incomplete.is_empty());
}
