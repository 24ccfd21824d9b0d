use crate::config::types::{Config, HarvesterConfig, OutputConfig, ScopeConfig, SourceConfig};
use crate::hierarchy::is_valid_code;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvester_config(&config.harvester)?;
    validate_source_config(&config.source)?;
    validate_output_config(&config.output)?;
    validate_scope_config(&config.scope)?;
    Ok(())
}

/// Validates request pacing and retry settings
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_base_ms ({}) cannot exceed backoff_max_ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    if config.run_deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run_deadline_secs must be greater than 0 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the source URL, templates and leaf pointer
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    for (name, template) in config.source_templates() {
        validate_template(name, template)?;
    }

    let pointer = &config.leaf_required_pointer;
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "leaf_required_pointer must be empty or start with '/', got '{}'",
            pointer
        )));
    }

    Ok(())
}

/// Validates a single URL template
fn validate_template(name: &str, template: &str) -> Result<(), ConfigError> {
    if !template.contains("{code}") {
        return Err(ConfigError::InvalidTemplate(format!(
            "{} template '{}' must contain {{code}}",
            name, template
        )));
    }

    // Every placeholder must be one we know how to fill
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ConfigError::InvalidTemplate(format!("{} template has an unclosed '{{'", name))
        })?;
        let placeholder = &after[..end];
        if !matches!(placeholder, "base" | "code" | "code2" | "code3") {
            return Err(ConfigError::InvalidTemplate(format!(
                "{} template uses unknown placeholder {{{}}}",
                name, placeholder
            )));
        }
        rest = &after[end + 1..];
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.artifact_dir.is_empty() {
        return Err(ConfigError::Validation(
            "artifact_dir cannot be empty".to_string(),
        ));
    }

    if config.index_path.is_empty() {
        return Err(ConfigError::Validation(
            "index_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates root codes and the subset restriction
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    if config.trees.is_empty() {
        return Err(ConfigError::Validation(
            "scope.trees must name at least one tree".to_string(),
        ));
    }

    for code in config.regions.iter().chain(&config.overseas_roots) {
        if !is_valid_code(code) {
            return Err(ConfigError::Validation(format!(
                "invalid root code '{}'",
                code
            )));
        }
    }

    for code in &config.only {
        if !config.regions.contains(code) && !config.overseas_roots.contains(code) {
            return Err(ConfigError::Validation(format!(
                "scope.only names unknown root '{}'",
                code
            )));
        }
    }

    Ok(())
}

impl SourceConfig {
    fn source_templates(&self) -> [(&'static str, &str); 4] {
        [
            ("local_listing", self.templates.local_listing.as_str()),
            ("precinct_listing", self.templates.precinct_listing.as_str()),
            ("overseas_listing", self.templates.overseas_listing.as_str()),
            ("leaf_document", self.templates.leaf_document.as_str()),
        ]
    }
}
