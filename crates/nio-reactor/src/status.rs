//! Reactor lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle state of a reactor
///
/// Transitions only move forward: `Inactive -> Active -> ShuttingDown -> ShutDown`,
/// or straight from `Inactive` to `ShutDown` when shut down before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReactorStatus {
    /// Created, dispatch loop not entered
    Inactive,
    /// Dispatch loop running
    Active,
    /// Shutdown requested, connections winding down
    ShuttingDown,
    /// Dispatch loop exited
    ShutDown,
}

impl ReactorStatus {
    /// Whether shutdown has been requested or completed
    pub fn is_terminating(&self) -> bool {
        *self >= ReactorStatus::ShuttingDown
    }
}

impl std::fmt::Display for ReactorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReactorStatus::Inactive => write!(f, "inactive"),
            ReactorStatus::Active => write!(f, "active"),
            ReactorStatus::ShuttingDown => write!(f, "shutting-down"),
            ReactorStatus::ShutDown => write!(f, "shut-down"),
        }
    }
}
