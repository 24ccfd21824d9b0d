//! Endpoint resolution
//!
//! Maps hierarchy nodes to the URLs of their child listings and, for
//! precincts, their result documents.

mod template;

pub use template::render;

use crate::config::SourceConfig;
use crate::hierarchy::{HierarchyNode, Level};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Endpoint-specific errors
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Rendered URL '{url}' is invalid: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// What an endpoint returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A `{"regions": [...]}` listing of a node's children
    Listing,
    /// A precinct result document
    Leaf,
}

/// One fetchable URL together with the node level it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    pub level: Level,
    pub kind: EndpointKind,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// URL templates for every endpoint family of the source
#[derive(Debug, Clone)]
pub struct EndpointTemplates {
    base: String,
    local_listing: String,
    precinct_listing: String,
    overseas_listing: String,
    leaf_document: String,
}

impl EndpointTemplates {
    pub fn from_config(source: &SourceConfig) -> Self {
        Self {
            base: source.base_url.trim_end_matches('/').to_string(),
            local_listing: source.templates.local_listing.clone(),
            precinct_listing: source.templates.precinct_listing.clone(),
            overseas_listing: source.templates.overseas_listing.clone(),
            leaf_document: source.templates.leaf_document.clone(),
        }
    }

    /// Resolves the endpoint that lists a node's children
    ///
    /// For a precinct this resolves its result document instead, since
    /// precincts have no children.
    pub fn listing(&self, node: &HierarchyNode) -> Result<Endpoint, EndpointError> {
        if node.is_leaf() {
            return self.leaf(node);
        }
        let template = match node.level {
            Level::Region | Level::Province | Level::Municipality => &self.local_listing,
            Level::Barangay | Level::Jurisdiction => &self.precinct_listing,
            Level::OverseasRoot | Level::RegionalGrouping | Level::CountryPost => {
                &self.overseas_listing
            }
            Level::Precinct => &self.leaf_document,
        };
        self.resolve(template, node, EndpointKind::Listing)
    }

    /// Resolves a precinct's result document
    pub fn leaf(&self, node: &HierarchyNode) -> Result<Endpoint, EndpointError> {
        self.resolve(&self.leaf_document, node, EndpointKind::Leaf)
    }

    fn resolve(
        &self,
        template: &str,
        node: &HierarchyNode,
        kind: EndpointKind,
    ) -> Result<Endpoint, EndpointError> {
        let rendered = render(template, &self.base, &node.code);
        let url = Url::parse(&rendered).map_err(|source| EndpointError::InvalidUrl {
            url: rendered.clone(),
            source,
        })?;
        Ok(Endpoint {
            url,
            level: node.level,
            kind,
        })
    }
}
