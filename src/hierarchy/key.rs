use serde::{Deserialize, Serialize};
use std::fmt;

/// Path-derived identifier of a node: root→node codes joined with `/`
///
/// Two nodes with the same full path always produce the same key. Leaf keys
/// address both the completion index and the artifact on disk; branch keys
/// identify failed or incomplete subtrees in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafKey(String);

impl LeafKey {
    /// Separator between codes in a key
    pub const SEPARATOR: char = '/';

    /// Builds a key from root→node codes
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let joined = segments
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// Parses a key from its string form, rejecting empty or invalid segments
    pub fn parse(s: &str) -> Option<Self> {
        if s.split(Self::SEPARATOR).all(super::is_valid_code) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Root→node codes
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR)
    }

    /// Number of codes in the key (equals the node's level depth)
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Returns true if `self` equals `prefix` or lies in its subtree
    pub fn starts_with(&self, prefix: &LeafKey) -> bool {
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0)
                && self.0[prefix.0.len()..].starts_with(Self::SEPARATOR))
    }
}

impl fmt::Display for LeafKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
