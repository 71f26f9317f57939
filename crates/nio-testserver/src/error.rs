//! Harness error types

use nio_reactor::ReactorError;
use thiserror::Error;

/// Test server errors
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Reactor allocation, listen, or shutdown failed
    #[error(transparent)]
    Reactor(#[from] ReactorError),

    /// The reactor thread could not be spawned
    #[error("Failed to spawn reactor thread: {0}")]
    Spawn(std::io::Error),

    /// `start` was called on a harness that already started once
    #[error("Test server already started")]
    AlreadyStarted,

    /// The reactor thread terminated abnormally while being joined
    #[error("Reactor thread interrupted: {0}")]
    Interrupted(String),
}

impl HarnessError {
    /// Whether this is an I/O failure (socket, runtime, or thread resources)
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            HarnessError::Reactor(ReactorError::Io(_)) | HarnessError::Spawn(_)
        )
    }
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
