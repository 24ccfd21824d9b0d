//! Listing and leaf document handling
//!
//! Every listing endpoint of the source returns the same shape:
//!
//! ```json
//! {"regions": [{"code": "0128", "name": "ILOCOS NORTE"}, ...]}
//! ```
//!
//! regardless of the level being listed.

use crate::hierarchy::{is_valid_code, HierarchyNode};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Key holding the child array in every listing document
pub const CHILDREN_KEY: &str = "regions";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("listing is not a JSON object")]
    NotAnObject,

    #[error("listing has no '{}' array", CHILDREN_KEY)]
    MissingChildren,

    #[error("{0} is a leaf and has no children")]
    LeafParent(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeafValidationError {
    #[error("leaf document is not a JSON object")]
    NotAnObject,

    #[error("leaf document is missing '{0}'")]
    MissingPointer(String),
}

/// Parses a listing document into the children of `parent`
///
/// Children keep source order. Duplicate codes are dropped, keeping the
/// first occurrence. Entries without a usable code are skipped.
pub fn parse_listing(
    parent: &HierarchyNode,
    document: &Value,
) -> Result<Vec<HierarchyNode>, ListingError> {
    if parent.is_leaf() {
        return Err(ListingError::LeafParent(parent.key().to_string()));
    }

    let object = document.as_object().ok_or(ListingError::NotAnObject)?;
    let entries = object
        .get(CHILDREN_KEY)
        .and_then(Value::as_array)
        .ok_or(ListingError::MissingChildren)?;

    let mut seen = HashSet::with_capacity(entries.len());
    let mut children = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(code) = entry.get("code").and_then(code_of) else {
            tracing::warn!("Skipping listing entry without code under {}", parent.key());
            continue;
        };

        if !is_valid_code(&code) {
            tracing::warn!("Skipping invalid code '{}' under {}", code, parent.key());
            continue;
        }

        if !seen.insert(code.clone()) {
            tracing::debug!("Dropping duplicate code '{}' under {}", code, parent.key());
            continue;
        }

        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(code.as_str())
            .to_string();

        if let Some(child) = parent.child(&code, &name) {
            children.push(child);
        }
    }

    Ok(children)
}

// Codes are strings in the source, but tolerate bare numbers
fn code_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Checks a leaf document before it is persisted
///
/// `required_pointer` is a JSON pointer (e.g. `/information/location`) that
/// must resolve to a non-null value; `None` only requires an object.
pub fn validate_leaf(
    document: &Value,
    required_pointer: Option<&str>,
) -> Result<(), LeafValidationError> {
    if !document.is_object() {
        return Err(LeafValidationError::NotAnObject);
    }

    if let Some(pointer) = required_pointer {
        match document.pointer(pointer) {
            Some(value) if !value.is_null() => {}
            _ => return Err(LeafValidationError::MissingPointer(pointer.to_string())),
        }
    }

    Ok(())
}
