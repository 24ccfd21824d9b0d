use super::{is_valid_code, LeafKey, Level};
use crate::HarvestError;

/// One geographic or jurisdictional unit discovered during a walk
///
/// Nodes are created by the walker when it parses a listing, are immutable,
/// and are discarded at the end of the run. Only leaves are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    /// The level of this node
    pub level: Level,

    /// Stable identifier from the source, unique among its siblings
    pub code: String,

    /// Ancestor codes, root to parent; length is `level.depth() - 1`
    pub parent_path: Vec<String>,

    /// Human-readable name from the listing
    pub display_name: String,
}

impl HierarchyNode {
    /// Creates a root node
    pub fn root(level: Level, code: &str, display_name: &str) -> Result<Self, HarvestError> {
        if !level.is_root() {
            return Err(HarvestError::Hierarchy(format!(
                "{} is not a root level",
                level
            )));
        }
        if !is_valid_code(code) {
            return Err(HarvestError::Hierarchy(format!(
                "invalid root code '{}'",
                code
            )));
        }
        Ok(Self {
            level,
            code: code.to_string(),
            parent_path: Vec::new(),
            display_name: display_name.to_string(),
        })
    }

    /// Creates a child of this node, or None if this node is a leaf
    pub fn child(&self, code: &str, display_name: &str) -> Option<Self> {
        let level = self.level.child()?;
        let mut parent_path = Vec::with_capacity(self.parent_path.len() + 1);
        parent_path.extend(self.parent_path.iter().cloned());
        parent_path.push(self.code.clone());

        Some(Self {
            level,
            code: code.to_string(),
            parent_path,
            display_name: display_name.to_string(),
        })
    }

    /// Rebuilds a node from a key recorded in a previous run
    ///
    /// Fails if the key's depth does not match the level.
    pub fn from_key(key: &LeafKey, level: Level) -> Result<Self, HarvestError> {
        let mut segments: Vec<String> = key.segments().map(str::to_string).collect();
        if segments.len() != level.depth() {
            return Err(HarvestError::Hierarchy(format!(
                "key '{}' has depth {} but {} is at depth {}",
                key,
                segments.len(),
                level,
                level.depth()
            )));
        }

        let code = segments.pop().unwrap_or_default();
        Ok(Self {
            level,
            display_name: code.clone(),
            code,
            parent_path: segments,
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.level.is_leaf()
    }

    /// Root→node codes
    pub fn full_path(&self) -> Vec<&str> {
        self.parent_path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.code.as_str()))
            .collect()
    }

    /// The path-derived key of this node
    pub fn key(&self) -> LeafKey {
        LeafKey::from_segments(&self.full_path())
    }
}
