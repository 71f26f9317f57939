//! Reactor audit log
//!
//! Every fault the reactor observes (accept failures, dispatch errors,
//! panicking connection tasks) is appended here, whether or not an
//! exception handler absorbed it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{FaultKind, ReactorError};

/// A fault recorded by the reactor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionEvent {
    /// Classification of the fault
    pub kind: FaultKind,
    /// Rendered error message
    pub message: String,
    /// When the fault was observed
    pub timestamp: DateTime<Utc>,
    /// Whether an exception handler absorbed it
    pub handled: bool,
}

impl ExceptionEvent {
    /// Create an event for `err`, stamped now
    pub fn new(err: &ReactorError, handled: bool) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            timestamp: Utc::now(),
            handled,
        }
    }

    /// Whether this fault stopped the reactor
    pub fn is_fatal(&self) -> bool {
        !self.handled
    }
}

/// Append-only, ordered list of exception events
#[derive(Debug, Default)]
pub struct AuditLog {
    events: RwLock<Vec<ExceptionEvent>>,
}

impl AuditLog {
    /// Create an empty audit log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(&self, event: ExceptionEvent) {
        self.events.write().push(event);
    }

    /// Copy of all events in recording order
    pub fn snapshot(&self) -> Vec<ExceptionEvent> {
        self.events.read().clone()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}
