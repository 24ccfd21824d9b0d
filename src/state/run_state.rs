//! Run state machine for the coordinator
//!
//! `Idle → Running → {Completed, PartiallyFailed}`
use crate::HarvestError;
use serde::Serialize;
use std::fmt;

/// Represents the current state of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Coordinator created, walk not started
    Idle,

    /// Walking the hierarchy
    Running,

    /// Every branch succeeded or was skipped as a duplicate
    Completed,

    /// At least one branch or leaf failed, or the run was cancelled
    PartiallyFailed,
}

impl RunState {
    /// `Idle → Running`
    pub fn start(self) -> Result<Self, HarvestError> {
        match self {
            Self::Idle => Ok(Self::Running),
            from => Err(HarvestError::InvalidTransition {
                from,
                to: Self::Running,
            }),
        }
    }

    /// `Running → Completed` when `clean`, otherwise `Running → PartiallyFailed`
    pub fn finish(self, clean: bool) -> Result<Self, HarvestError> {
        let to = if clean {
            Self::Completed
        } else {
            Self::PartiallyFailed
        };
        match self {
            Self::Running => Ok(to),
            from => Err(HarvestError::InvalidTransition { from, to }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially_failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
