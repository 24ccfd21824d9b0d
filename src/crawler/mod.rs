//! Crawler module for hierarchy traversal and document fetching
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with retry and backoff
//! - The process-wide concurrency limiter and cancellation
//! - Listing parsing and leaf validation
//! - Recursive tree walking with a join per node
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod limiter;
mod listing;
mod walker;

pub use coordinator::{harvest, RunCoordinator};
pub use fetcher::{
    build_http_client, classify_status, content_hash, Fetch, FetchResult, HttpFetcher,
    RetryPolicy, StatusClass,
};
pub use limiter::{CancelHandle, Cancelled, ConcurrencyLimiter, FetchPermit};
pub use listing::{parse_listing, validate_leaf, LeafValidationError, ListingError, CHILDREN_KEY};
pub use walker::TreeWalker;
