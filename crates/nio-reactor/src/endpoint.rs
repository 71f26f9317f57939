//! Listener endpoints

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A bound local address a reactor accepts connections on
///
/// Cheap to clone; clones share the closed flag.
#[derive(Debug, Clone)]
pub struct ListenerEndpoint {
    address: SocketAddr,
    closed: Arc<AtomicBool>,
}

impl ListenerEndpoint {
    pub(crate) fn new(address: SocketAddr) -> Self {
        Self {
            address,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The bound address, with the OS-assigned port
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// The bound port
    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Whether the reactor has stopped accepting on this endpoint
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl PartialEq for ListenerEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for ListenerEndpoint {}

impl std::fmt::Display for ListenerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}
