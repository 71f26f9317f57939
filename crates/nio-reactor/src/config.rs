//! Reactor configuration types

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::{ReactorError, Result};

/// Reactor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorConfig {
    /// Address listeners bind to when asked for an ephemeral port
    pub bind_address: IpAddr,
    /// Read inactivity before the handler's timeout callback fires, in milliseconds
    pub socket_timeout_ms: u64,
    /// Size of the per-connection read buffer in bytes
    pub read_buffer_size: usize,
    /// Disable Nagle on accepted sockets
    pub tcp_nodelay: bool,
    /// Time connections get to wind down after shutdown, in milliseconds
    pub shutdown_grace_ms: u64,
    /// Maximum number of concurrently open connections
    pub max_connections: usize,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            socket_timeout_ms: 30_000,
            read_buffer_size: 8 * 1024,
            tcp_nodelay: true,
            shutdown_grace_ms: 500,
            max_connections: 256,
        }
    }
}

impl ReactorConfig {
    /// Create a configuration for local testing
    pub fn local_test() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            socket_timeout_ms: 5_000,
            max_connections: 32,
            ..Default::default()
        }
    }

    /// Default config overlaid with `NIO_*` environment variables
    ///
    /// Durations use humantime syntax (`250ms`, `5s`).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("NIO_BIND_ADDRESS") {
            config.bind_address = addr
                .parse()
                .map_err(|e| ReactorError::Config(format!("NIO_BIND_ADDRESS={}: {}", addr, e)))?;
        }
        if let Ok(value) = std::env::var("NIO_SOCKET_TIMEOUT") {
            config.socket_timeout_ms = parse_millis("NIO_SOCKET_TIMEOUT", &value)?;
        }
        if let Ok(value) = std::env::var("NIO_SHUTDOWN_GRACE") {
            config.shutdown_grace_ms = parse_millis("NIO_SHUTDOWN_GRACE", &value)?;
        }
        if let Ok(value) = std::env::var("NIO_READ_BUFFER") {
            config.read_buffer_size = value
                .parse()
                .map_err(|e| ReactorError::Config(format!("NIO_READ_BUFFER={}: {}", value, e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the reactor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(ReactorError::Config("read_buffer_size must be > 0".into()));
        }
        if self.max_connections == 0 {
            return Err(ReactorError::Config("max_connections must be > 0".into()));
        }
        let limit = Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        if self.max_connections > limit {
            return Err(ReactorError::Config(format!(
                "max_connections must be <= {}",
                limit
            )));
        }
        if self.socket_timeout_ms == 0 {
            return Err(ReactorError::Config("socket_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Wildcard-port address on the configured interface
    pub fn ephemeral_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, 0)
    }

    /// Get the socket timeout as a Duration
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Get the shutdown grace period as a Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn parse_millis(name: &str, value: &str) -> Result<u64> {
    humantime::parse_duration(value)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| ReactorError::Config(format!("{}={}: {}", name, value, e)))
}
