//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `RunState`: the coordinator's run state machine
//! - `FailureKind` / `FailureRecord`: failures attributed to the smallest failing unit

mod failure;
mod run_state;

// Re-export main types
pub use failure::{FailureKind, FailureRecord};
pub use run_state::RunState;
