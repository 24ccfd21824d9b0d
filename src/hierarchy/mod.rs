//! Geographic hierarchy model
//!
//! This module defines the levels of the two harvested trees, the nodes the
//! walker creates while parsing listings, and the path-derived keys used for
//! deduplication and artifact addressing.
//!
//! # Trees
//!
//! - Local: `Region → Province → Municipality → Barangay → Precinct`
//! - Overseas: `OverseasRoot → RegionalGrouping → CountryPost → Jurisdiction → Precinct`

mod key;
mod level;
mod node;

pub use key::LeafKey;
pub use level::{Level, TreeKind};
pub use node::HierarchyNode;

/// Returns true if `code` can be used as one path segment
///
/// Codes become directory and file names under the artifact root, so they
/// must be non-empty and must not contain separators or dot segments.
pub fn is_valid_code(code: &str) -> bool {
    !code.is_empty()
        && code != "."
        && code != ".."
        && !code.starts_with('.')
        && !code.contains(['/', '\\', '\0'])
}
