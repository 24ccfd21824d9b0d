//! Configuration module for Precinct-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section and key is optional; omitted values fall back to the
//! defaults for the 2025 results source.
//!
//! # Example
//!
//! ```no_run
//! use precinct_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Concurrency ceiling: {}", config.harvester.max_concurrent_requests);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HarvesterConfig, OutputConfig, ScopeConfig, SourceConfig, TemplateConfig,
    DEFAULT_REGIONS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
