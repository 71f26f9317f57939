//! NIO Test Server - ephemeral-port server harness for reactor tests
//!
//! Wraps a [`ListeningReactor`](nio_reactor::ListeningReactor) with
//! start/join/shutdown controls so tests can stand up a real TCP server in a
//! couple of lines and inspect how it died.
//!
//! # Example
//!
//! ```rust,no_run
//! use nio_reactor::{ReactorConfig, ServiceHandler, Session};
//! use nio_testserver::TestServer;
//!
//! struct Silent;
//!
//! #[async_trait::async_trait]
//! impl ServiceHandler for Silent {
//!     async fn connected(&self, _session: &mut Session) -> nio_reactor::Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn input_ready(&self, _session: &mut Session, _data: bytes::Bytes) -> nio_reactor::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = TestServer::new(ReactorConfig::local_test())?;
//!     server.start(Silent)?;
//!
//!     let endpoint = server.listener_endpoint().expect("started");
//!     println!("Test server on {}", endpoint);
//!
//!     server.shutdown()?;
//!     assert!(server.exception().is_none());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod server;

// Re-exports
pub use error::{HarnessError, Result};
pub use server::{DispatchFactory, TestServer, SHUTDOWN_JOIN_TIMEOUT, WORKER_COUNT};
