use crate::hierarchy::TreeKind;
use serde::Deserialize;

/// Main configuration structure for Precinct-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub harvester: HarvesterConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
}

/// Request pacing, retry and refresh behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HarvesterConfig {
    /// Hard ceiling on simultaneous outstanding requests, process-wide
    pub max_concurrent_requests: u32,

    /// Per-call deadline (milliseconds)
    pub request_timeout_ms: u64,

    /// Connection establishment deadline (milliseconds)
    pub connect_timeout_ms: u64,

    /// Maximum attempts per request, including the first
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles per attempt (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound on the exponential part of the backoff (milliseconds)
    pub backoff_max_ms: u64,

    /// Uniform random jitter added to every backoff (milliseconds)
    pub backoff_jitter_ms: u64,

    /// Pause before every request attempt (milliseconds)
    pub request_delay_ms: u64,

    /// Refetch leaves even if the completion index marks them complete
    pub force_refresh: bool,

    /// Optional wall-clock limit for the whole run (seconds)
    pub run_deadline_secs: Option<u64>,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            request_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            backoff_jitter_ms: 250,
            request_delay_ms: 100,
            force_refresh: false,
            run_deadline_secs: None,
        }
    }
}

/// Remote data source description
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SourceConfig {
    /// Scheme and host (and optional path prefix) substituted for `{base}`
    pub base_url: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// JSON pointer every leaf document must contain; empty disables the check
    pub leaf_required_pointer: String,

    /// URL templates per endpoint family
    pub templates: TemplateConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://2025electionresults.comelec.gov.ph".to_string(),
            user_agent: concat!("precinct-harvest/", env!("CARGO_PKG_VERSION")).to_string(),
            leaf_required_pointer: "/information/location".to_string(),
            templates: TemplateConfig::default(),
        }
    }
}

/// URL templates
///
/// Placeholders: `{base}`, `{code}`, `{code2}` (first two characters of the
/// code) and `{code3}` (first three characters).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TemplateConfig {
    /// Children of regions, provinces and municipalities
    pub local_listing: String,

    /// Precinct lists of barangays and overseas jurisdictions
    pub precinct_listing: String,

    /// Children of the overseas root, regional groupings and country posts
    pub overseas_listing: String,

    /// Precinct result documents
    pub leaf_document: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            local_listing: "{base}/data/regions/local/{code}.json".to_string(),
            precinct_listing: "{base}/data/regions/precinct/{code2}/{code}.json".to_string(),
            overseas_listing: "{base}/data/regions/overseas/{code}.json".to_string(),
            leaf_document: "{base}/data/er/{code3}/{code}.json".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Root directory of the artifact tree
    pub artifact_dir: String,

    /// Path to the SQLite completion index
    pub index_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_dir: "./election_data".to_string(),
            index_path: "./harvest.db".to_string(),
        }
    }
}

/// Which roots a run starts from
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScopeConfig {
    /// Trees to harvest
    pub trees: Vec<TreeKind>,

    /// Local region root codes, in processing order
    pub regions: Vec<String>,

    /// Overseas root codes
    pub overseas_roots: Vec<String>,

    /// Restrict the run to these root codes; empty means all
    pub only: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            trees: vec![TreeKind::Local, TreeKind::Overseas],
            regions: DEFAULT_REGIONS.iter().map(|s| s.to_string()).collect(),
            overseas_roots: vec!["R0OAV00".to_string()],
            only: Vec::new(),
        }
    }
}

/// Local region codes published by the source
pub const DEFAULT_REGIONS: &[&str] = &[
    "R001000", "R002000", "R003000", "R005000", "R006000", "R007000", "R008000", "R009000",
    "R00LAV0", "R00NIR0", "R010000", "R011000", "R012000", "R013000", "R04A000", "R04B000",
    "R0BARMM", "R0CAR00", "R0NCR00",
];
