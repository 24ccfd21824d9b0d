//! Recursive hierarchy traversal
//!
//! Every node's future is the join of its children's futures, so a node is
//! reported done only after its whole subtree has finished. Children of one
//! node run concurrently; the global limiter is the only thing bounding how
//! many requests are in flight. Permits are held for the duration of a single
//! fetch, never while a subtree is being walked, so a deep tree cannot starve
//! itself of permits.

use crate::crawler::fetcher::{Fetch, FetchResult};
use crate::crawler::limiter::ConcurrencyLimiter;
use crate::crawler::listing::{parse_listing, validate_leaf};
use crate::endpoint::{Endpoint, EndpointTemplates};
use crate::hierarchy::{HierarchyNode, Level};
use crate::output::{ArtifactStore, RunTally, WriteError};
use crate::state::{FailureKind, FailureRecord};
use crate::storage::{CompletionMarker, DedupStore};
use crate::HarvestError;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of persisting one leaf
enum Persisted {
    Committed,
    Failed(String),
}

/// Walks subtrees on behalf of one run
pub struct TreeWalker<F> {
    fetcher: Arc<F>,
    limiter: Arc<ConcurrencyLimiter>,
    dedup: Arc<DedupStore>,
    store: Arc<dyn ArtifactStore>,
    templates: EndpointTemplates,
    tally: Arc<RunTally>,
    run_id: i64,
    force_refresh: bool,
    leaf_pointer: Option<String>,
}

impl<F: Fetch> TreeWalker<F> {
    pub fn new(
        fetcher: Arc<F>,
        limiter: Arc<ConcurrencyLimiter>,
        dedup: Arc<DedupStore>,
        store: Arc<dyn ArtifactStore>,
        templates: EndpointTemplates,
        tally: Arc<RunTally>,
        run_id: i64,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            dedup,
            store,
            templates,
            tally,
            run_id,
            force_refresh: false,
            leaf_pointer: None,
        }
    }

    /// Refetch leaves even when they are already marked complete
    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    /// JSON pointer every leaf document must contain
    pub fn with_leaf_pointer(mut self, pointer: Option<String>) -> Self {
        self.leaf_pointer = pointer;
        self
    }

    /// Processes `node` and everything below it
    ///
    /// Per-node failures are recorded in the tally and never returned. An
    /// error here is fatal for the whole run.
    pub fn walk(&self, node: HierarchyNode) -> BoxFuture<'_, Result<(), HarvestError>> {
        async move {
            if self.limiter.is_closed() {
                self.tally.record_incomplete(node.key(), node.level);
                return Ok(());
            }

            if node.is_leaf() {
                return self.process_leaf(node).await;
            }

            let Some(children) = self.list_children(&node).await? else {
                return Ok(());
            };

            let count = children.len();
            try_join_all(children.into_iter().map(|child| self.walk(child))).await?;

            if matches!(
                node.level,
                Level::Region | Level::Province | Level::OverseasRoot | Level::RegionalGrouping
            ) {
                tracing::info!(
                    "Completed {} {} ({}, {} children)",
                    node.level,
                    node.key(),
                    node.display_name,
                    count
                );
            } else {
                tracing::debug!("Completed {} {} ({} children)", node.level, node.key(), count);
            }
            Ok(())
        }
        .boxed()
    }

    /// Fetches and parses a branch's listing
    ///
    /// Returns `None` when there is nothing to descend into: the listing
    /// failed, was pruned, or the run was cancelled first.
    async fn list_children(
        &self,
        node: &HierarchyNode,
    ) -> Result<Option<Vec<HierarchyNode>>, HarvestError> {
        let endpoint = match self.templates.listing(node) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.fail(node, FailureKind::Permanent, e.to_string());
                return Ok(None);
            }
        };

        let Some(result) = self.fetch_with_permit(node, &endpoint).await else {
            return Ok(None);
        };

        match result {
            FetchResult::Success { document, .. } => match parse_listing(node, &document) {
                Ok(children) if children.is_empty() => {
                    tracing::debug!("{} {} has no children", node.level, node.key());
                    self.tally.record_pruned();
                    Ok(None)
                }
                Ok(children) => {
                    self.tally.record_listed();
                    Ok(Some(children))
                }
                Err(e) => {
                    self.fail(node, FailureKind::Permanent, e.to_string());
                    Ok(None)
                }
            },
            FetchResult::NotFound => {
                tracing::debug!("No listing for {} {}", node.level, node.key());
                self.tally.record_pruned();
                Ok(None)
            }
            FetchResult::TransientFailure { cause } => {
                self.fail(node, FailureKind::Transient, cause);
                Ok(None)
            }
            FetchResult::PermanentFailure { cause } => {
                self.fail(node, FailureKind::Permanent, cause);
                Ok(None)
            }
        }
    }

    /// Dedup check, fetch, validate, write, mark complete
    async fn process_leaf(&self, node: HierarchyNode) -> Result<(), HarvestError> {
        let key = node.key();

        if !self.force_refresh && self.dedup.is_complete(&key)? {
            tracing::debug!("Skipping completed precinct {}", key);
            self.tally.record_skipped();
            return Ok(());
        }

        let endpoint = match self.templates.leaf(&node) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.fail(&node, FailureKind::Permanent, e.to_string());
                return Ok(());
            }
        };

        let Some(result) = self.fetch_with_permit(&node, &endpoint).await else {
            return Ok(());
        };
        self.tally.record_attempt();

        let (document, content_hash) = match result {
            FetchResult::Success {
                document,
                content_hash,
            } => (document, content_hash),
            FetchResult::NotFound => {
                tracing::warn!("No document for precinct {} at {}", key, endpoint);
                self.tally.record_not_found(key);
                return Ok(());
            }
            FetchResult::TransientFailure { cause } => {
                self.fail(&node, FailureKind::Transient, cause);
                return Ok(());
            }
            FetchResult::PermanentFailure { cause } => {
                self.fail(&node, FailureKind::Permanent, cause);
                return Ok(());
            }
        };

        if let Err(e) = validate_leaf(&document, self.leaf_pointer.as_deref()) {
            self.fail(&node, FailureKind::Permanent, e.to_string());
            return Ok(());
        }

        match self.persist(&node, document, content_hash).await? {
            Persisted::Committed => {
                tracing::debug!("Stored precinct {}", key);
                self.tally.record_success();
            }
            Persisted::Failed(cause) => self.fail(&node, FailureKind::Storage, cause),
        }
        Ok(())
    }

    /// Runs one fetch under a limiter permit
    ///
    /// Returns `None` if the run was cancelled while waiting; the node is
    /// then recorded as incomplete.
    async fn fetch_with_permit(
        &self,
        node: &HierarchyNode,
        endpoint: &Endpoint,
    ) -> Option<FetchResult> {
        let permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                self.tally.record_incomplete(node.key(), node.level);
                return None;
            }
        };

        let result = self.fetcher.fetch(endpoint).await;
        drop(permit);
        Some(result)
    }

    /// Writes the artifact, then the completion marker, off the async threads
    async fn persist(
        &self,
        node: &HierarchyNode,
        document: Value,
        content_hash: String,
    ) -> Result<Persisted, HarvestError> {
        let key = node.key();
        let store = Arc::clone(&self.store);
        let dedup = Arc::clone(&self.dedup);
        let marker = CompletionMarker {
            content_hash,
            run_id: self.run_id,
        };

        tokio::task::spawn_blocking(move || -> Result<Persisted, HarvestError> {
            match store.write(&key, &document) {
                Ok(_) => {}
                Err(WriteError::Exhausted { path, source }) => {
                    return Err(HarvestError::StorageExhausted { path, source });
                }
                Err(e) => return Ok(Persisted::Failed(e.to_string())),
            }

            // Only reached once the artifact is durable
            dedup.mark_complete(&key, &marker)?;
            Ok(Persisted::Committed)
        })
        .await?
    }

    fn fail(&self, node: &HierarchyNode, kind: FailureKind, cause: String) {
        tracing::warn!("{} {} failed ({}): {}", node.level, node.key(), kind, cause);
        self.tally.record_failure(FailureRecord {
            key: node.key(),
            level: node.level,
            kind,
            cause,
        });
    }
}
