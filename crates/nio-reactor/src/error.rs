//! Reactor error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reactor errors
#[derive(Error, Debug)]
pub enum ReactorError {
    /// Socket or runtime I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A service handler callback failed
    #[error("Service handler failed on session {session}: {reason}")]
    Handler { session: u64, reason: String },

    /// A dispatch task died unexpectedly
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The dispatch loop has already been entered
    #[error("Reactor already started")]
    AlreadyStarted,

    /// The reactor has been shut down
    #[error("Reactor is shut down")]
    ShutDown,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReactorError {
    /// Build a handler error from anything displayable
    pub fn handler(session: u64, reason: impl std::fmt::Display) -> Self {
        ReactorError::Handler {
            session,
            reason: reason.to_string(),
        }
    }

    /// Coarse classification recorded in the audit log
    pub fn kind(&self) -> FaultKind {
        match self {
            ReactorError::Io(_) => FaultKind::Io,
            ReactorError::Handler { .. } => FaultKind::Handler,
            ReactorError::Runtime(_) => FaultKind::Runtime,
            ReactorError::AlreadyStarted | ReactorError::ShutDown | ReactorError::Config(_) => {
                FaultKind::State
            }
        }
    }
}

/// Classification of a reactor fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Socket level failure
    Io,
    /// Service handler failure
    Handler,
    /// Task panic or runtime failure
    Runtime,
    /// Lifecycle misuse
    State,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Io => write!(f, "io"),
            FaultKind::Handler => write!(f, "handler"),
            FaultKind::Runtime => write!(f, "runtime"),
            FaultKind::State => write!(f, "state"),
        }
    }
}

/// Result type for reactor operations
pub type Result<T> = std::result::Result<T, ReactorError>;
