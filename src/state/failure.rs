use crate::hierarchy::{LeafKey, Level};
use serde::Serialize;
use std::fmt;

/// Classification of a failure attributed to one leaf or one listing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retry budget exhausted on timeouts, 5xx or rate limiting
    Transient,

    /// Non-retryable response, undecodable body or failed validation
    Permanent,

    /// The artifact could not be durably written
    Storage,

    /// Not processed before the run was cancelled; resumable
    Incomplete,
}

impl FailureKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Storage => "storage",
            Self::Incomplete => "incomplete",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "transient" => Some(Self::Transient),
            "permanent" => Some(Self::Permanent),
            "storage" => Some(Self::Storage),
            "incomplete" => Some(Self::Incomplete),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// One failed unit of work: a leaf fetch/write or a branch listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Path key of the failed node
    pub key: LeafKey,

    /// Level of the failed node; branch levels mean the listing call failed
    pub level: Level,

    pub kind: FailureKind,

    /// Human-readable cause
    pub cause: String,
}

impl FailureRecord {
    /// Returns true if the failure prevented a whole subtree from being enumerated
    pub fn is_branch(&self) -> bool {
        !self.level.is_leaf()
    }
}
