//! Level definitions for the local and overseas trees
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two published trees a root belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreeKind {
    /// Domestic regions down to barangay precincts
    Local,
    /// Overseas absentee voting posts
    Overseas,
}

impl TreeKind {
    /// The level of this tree's root nodes
    pub fn root_level(&self) -> Level {
        match self {
            Self::Local => Level::Region,
            Self::Overseas => Level::OverseasRoot,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Overseas => "overseas",
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A level in the hierarchy
///
/// Both trees are five levels deep and share the `Precinct` leaf level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    // ===== Local tree =====
    Region,
    Province,
    Municipality,
    Barangay,

    // ===== Overseas tree =====
    OverseasRoot,
    RegionalGrouping,
    CountryPost,
    Jurisdiction,

    // ===== Shared leaf =====
    Precinct,
}

impl Level {
    /// Depth of this level, with roots at depth 1
    pub fn depth(&self) -> usize {
        match self {
            Self::Region | Self::OverseasRoot => 1,
            Self::Province | Self::RegionalGrouping => 2,
            Self::Municipality | Self::CountryPost => 3,
            Self::Barangay | Self::Jurisdiction => 4,
            Self::Precinct => 5,
        }
    }

    /// The level of this level's children, or None for the leaf level
    pub fn child(&self) -> Option<Level> {
        match self {
            Self::Region => Some(Self::Province),
            Self::Province => Some(Self::Municipality),
            Self::Municipality => Some(Self::Barangay),
            Self::Barangay => Some(Self::Precinct),
            Self::OverseasRoot => Some(Self::RegionalGrouping),
            Self::RegionalGrouping => Some(Self::CountryPost),
            Self::CountryPost => Some(Self::Jurisdiction),
            Self::Jurisdiction => Some(Self::Precinct),
            Self::Precinct => None,
        }
    }

    /// Returns true for the leaf level
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Precinct)
    }

    /// Returns true for levels that start a tree
    pub fn is_root(&self) -> bool {
        self.depth() == 1
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Province => "province",
            Self::Municipality => "municipality",
            Self::Barangay => "barangay",
            Self::OverseasRoot => "overseas_root",
            Self::RegionalGrouping => "regional_grouping",
            Self::CountryPost => "country_post",
            Self::Jurisdiction => "jurisdiction",
            Self::Precinct => "precinct",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "region" => Some(Self::Region),
            "province" => Some(Self::Province),
            "municipality" => Some(Self::Municipality),
            "barangay" => Some(Self::Barangay),
            "overseas_root" => Some(Self::OverseasRoot),
            "regional_grouping" => Some(Self::RegionalGrouping),
            "country_post" => Some(Self::CountryPost),
            "jurisdiction" => Some(Self::Jurisdiction),
            "precinct" => Some(Self::Precinct),
            _ => None,
        }
    }

    pub fn all_levels() -> Vec<Self> {
        vec![
            Self::Region,
            Self::Province,
            Self::Municipality,
            Self::Barangay,
            Self::OverseasRoot,
            Self::RegionalGrouping,
            Self::CountryPost,
            Self::Jurisdiction,
            Self::Precinct,
        ]
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
