//! In-memory hierarchy source
//!
//! Serves listing and leaf documents at the URLs the default templates
//! produce, records every call, and tracks how many calls overlap.

use async_trait::async_trait;
use precinct_harvest::crawler::{CancelHandle, Fetch, FetchResult};
use precinct_harvest::endpoint::Endpoint;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://synthetic.test";

/// What the source answers for one URL path
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    NotFound,
    Transient,
    Permanent,
}

/// Counters shared between the source and the test body
#[derive(Debug, Default)]
pub struct SourceStats {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl SourceStats {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Calls for precinct documents
    pub fn leaf_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with("/data/er/"))
            .count()
    }

    /// Calls for listings at any level
    pub fn listing_calls(&self) -> usize {
        self.total_calls() - self.leaf_calls()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }
}

/// Cancels the run once a number of leaf fetches has completed
pub struct CancelAfter {
    pub leaves: usize,
    pub handle: Arc<Mutex<Option<CancelHandle>>>,
}

pub struct SyntheticSource {
    replies: HashMap<String, Reply>,
    delay: Duration,
    stats: Arc<SourceStats>,
    cancel_after: Option<CancelAfter>,
}

impl SyntheticSource {
    /// Builds a complete local tree with the given fan-out per level
    ///
    /// Codes are built by appending a level letter and index to the parent
    /// code (`R1`, `R1P2`, `R1P2M1`, `R1P2M1B1`, `R1P2M1B1X3`), so every
    /// code is globally unique.
    pub fn tree(
        regions: usize,
        provinces: usize,
        municipalities: usize,
        barangays: usize,
        precincts: usize,
    ) -> Self {
        let mut replies = HashMap::new();

        for r in 1..=regions {
            let region = format!("R{}", r);
            let province_codes: Vec<String> =
                (1..=provinces).map(|p| format!("{}P{}", region, p)).collect();
            replies.insert(local_path(&region), listing(&province_codes));

            for province in &province_codes {
                let municipality_codes: Vec<String> = (1..=municipalities)
                    .map(|m| format!("{}M{}", province, m))
                    .collect();
                replies.insert(local_path(province), listing(&municipality_codes));

                for municipality in &municipality_codes {
                    let barangay_codes: Vec<String> = (1..=barangays)
                        .map(|b| format!("{}B{}", municipality, b))
                        .collect();
                    replies.insert(local_path(municipality), listing(&barangay_codes));

                    for barangay in &barangay_codes {
                        let precinct_codes: Vec<String> = (1..=precincts)
                            .map(|x| format!("{}X{}", barangay, x))
                            .collect();
                        replies.insert(precinct_list_path(barangay), listing(&precinct_codes));

                        for precinct in &precinct_codes {
                            replies.insert(leaf_path(precinct), Reply::Json(leaf_document(precinct)));
                        }
                    }
                }
            }
        }

        Self {
            replies,
            delay: Duration::ZERO,
            stats: Arc::new(SourceStats::default()),
            cancel_after: None,
        }
    }

    /// Root codes of a tree built by [`SyntheticSource::tree`]
    pub fn region_codes(regions: usize) -> Vec<String> {
        (1..=regions).map(|r| format!("R{}", r)).collect()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cancel_after(mut self, cancel_after: CancelAfter) -> Self {
        self.cancel_after = Some(cancel_after);
        self
    }

    /// Overrides the reply for one URL path
    pub fn with_reply(mut self, path: String, reply: Reply) -> Self {
        self.replies.insert(path, reply);
        self
    }

    pub fn stats(&self) -> Arc<SourceStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Fetch for SyntheticSource {
    async fn fetch(&self, endpoint: &Endpoint) -> FetchResult {
        let path = endpoint.url.path().to_string();

        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(now, Ordering::SeqCst);
        self.stats.calls.lock().unwrap().push(path.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let result = match self.replies.get(&path) {
            Some(Reply::Json(document)) => FetchResult::Success {
                content_hash: precinct_harvest::crawler::content_hash(document),
                document: document.clone(),
            },
            Some(Reply::NotFound) | None => FetchResult::NotFound,
            Some(Reply::Transient) => FetchResult::TransientFailure {
                cause: "HTTP 503 after 3 attempts".to_string(),
            },
            Some(Reply::Permanent) => FetchResult::PermanentFailure {
                cause: "HTTP 403".to_string(),
            },
        };

        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(cancel_after) = &self.cancel_after {
            if self.stats.leaf_calls() >= cancel_after.leaves {
                if let Some(handle) = cancel_after.handle.lock().unwrap().as_ref() {
                    handle.cancel();
                }
            }
        }

        result
    }
}

pub fn local_path(code: &str) -> String {
    format!("/data/regions/local/{}.json", code)
}

pub fn precinct_list_path(code: &str) -> String {
    format!("/data/regions/precinct/{}/{}.json", &code[..2], code)
}

pub fn leaf_path(code: &str) -> String {
    format!("/data/er/{}/{}.json", &code[..3], code)
}

pub fn listing(codes: &[String]) -> Reply {
    Reply::Json(json!({
        "regions": codes
            .iter()
            .map(|c| json!({"code": c, "name": format!("Name of {}", c)}))
            .collect::<Vec<_>>()
    }))
}

pub fn leaf_document(code: &str) -> Value {
    json!({
        "information": {
            "precinctId": code,
            "location": format!("REGION, PROVINCE, MUNICIPALITY, {}", code)
        },
        "national": [{"contestCode": "SEN", "candidates": [{"name": "A", "votes": 10}]}]
    })
}
