//! HTTP fetcher implementation
//!
//! This module handles all network requests for the harvester, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - Status and transport error classification
//! - Bounded retries with exponential backoff and jitter
//! - Content hashing of fetched documents

use crate::config::{Config, HarvesterConfig};
use crate::endpoint::Endpoint;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// The endpoint returned a JSON document
    Success {
        document: Value,
        /// SHA-256 of the serialized document
        content_hash: String,
    },

    /// The endpoint does not exist; an absent listing means zero children
    NotFound,

    /// Retry budget exhausted on a retryable condition
    TransientFailure { cause: String },

    /// Retrying cannot change the outcome
    PermanentFailure { cause: String },
}

/// Source of documents for the tree walker
///
/// Implementations apply their own retry policy and never touch the
/// concurrency limiter or the dedup store; callers own that state.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint) -> FetchResult;
}

/// How a single HTTP status should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    NotFound,
    Retryable,
    Permanent,
}

/// Classifies an HTTP status
///
/// | Status | Class |
/// |--------|-------|
/// | 2xx | Success |
/// | 404 | NotFound |
/// | 408, 429 | Retryable (rate limited / request timeout) |
/// | 5xx | Retryable |
/// | anything else | Permanent |
pub fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status == StatusCode::NOT_FOUND {
        StatusClass::NotFound
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        StatusClass::Retryable
    } else {
        StatusClass::Permanent
    }
}

/// Hex SHA-256 of a document's compact serialization
pub fn content_hash(document: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Retry parameters for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HarvesterConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            jitter: Duration::from_millis(config.backoff_jitter_ms),
        }
    }

    /// Backoff before attempt `attempt + 1`, excluding jitter
    ///
    /// `attempt` is 1-based: the delay after the first failure is the base.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }

    /// Backoff before attempt `attempt + 1`, with uniform jitter added
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.base_delay(attempt) + jitter
    }
}

/// Outcome of one HTTP attempt
enum Attempt {
    Done(FetchResult),
    Retry(String),
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The full harvester configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.source.user_agent.clone())
        .timeout(Duration::from_millis(config.harvester.request_timeout_ms))
        .connect_timeout(Duration::from_millis(config.harvester.connect_timeout_ms))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a reqwest client
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx, valid JSON | Success |
/// | HTTP 2xx, invalid JSON | Immediate PermanentFailure |
/// | HTTP 404 | Immediate NotFound |
/// | HTTP 408 / 429 / 5xx | Retry with backoff |
/// | Timeout / connect / transport error | Retry with backoff |
/// | Any other status | Immediate PermanentFailure |
///
/// Once `max_attempts` is exhausted a `TransientFailure` is returned.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    request_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            policy: RetryPolicy::from_config(&config.harvester),
            request_delay: Duration::from_millis(config.harvester.request_delay_ms),
        })
    }

    async fn attempt(&self, endpoint: &Endpoint) -> Attempt {
        let response = match self.client.get(endpoint.url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(describe_transport_error(&e)),
        };

        let status = response.status();
        match classify_status(status) {
            StatusClass::Success => {}
            StatusClass::NotFound => return Attempt::Done(FetchResult::NotFound),
            StatusClass::Retryable => return Attempt::Retry(format!("HTTP {}", status.as_u16())),
            StatusClass::Permanent => {
                return Attempt::Done(FetchResult::PermanentFailure {
                    cause: format!("HTTP {}", status.as_u16()),
                })
            }
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Attempt::Retry(describe_transport_error(&e)),
        };

        match serde_json::from_slice::<Value>(&body) {
            Ok(document) => {
                let content_hash = content_hash(&document);
                Attempt::Done(FetchResult::Success {
                    document,
                    content_hash,
                })
            }
            Err(e) => Attempt::Done(FetchResult::PermanentFailure {
                cause: format!("invalid JSON: {}", e),
            }),
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, endpoint: &Endpoint) -> FetchResult {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            tracing::debug!("GET {} (attempt {}/{})", endpoint, attempt, max_attempts);

            match self.attempt(endpoint).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(cause) if attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::debug!(
                        "Transient failure for {}: {}; retrying in {:?}",
                        endpoint,
                        cause,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::Retry(cause) => {
                    return FetchResult::TransientFailure {
                        cause: format!("{} after {} attempts", cause, max_attempts),
                    };
                }
            }
        }

        FetchResult::TransientFailure {
            cause: "no attempts made".to_string(),
        }
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    }
}
