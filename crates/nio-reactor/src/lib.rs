//! NIO Reactor - listening TCP reactor with pluggable event dispatch
//!
//! This crate provides a small multi-worker reactor that accepts TCP
//! connections and hands each one to an [`EventDispatch`] strategy.
//!
//! # Overview
//!
//! - **ListeningReactor**: binds endpoints and runs the blocking dispatch loop
//! - **ServerEventDispatch**: default strategy feeding socket events to a [`ServiceHandler`]
//! - **ExceptionHandler**: decides whether a reactor-level fault is survivable
//! - **AuditLog**: ordered record of every fault the reactor saw
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use nio_reactor::{server_dispatch, ListeningReactor, ReactorConfig, Result, ServiceHandler, Session};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ServiceHandler for Echo {
//!     async fn connected(&self, _session: &mut Session) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn input_ready(&self, session: &mut Session, data: Bytes) -> Result<()> {
//!         session.submit(&data);
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let config = ReactorConfig::local_test();
//!     let reactor = Arc::new(ListeningReactor::new(2, config)?);
//!     let endpoint = reactor.listen(reactor.config().ephemeral_address())?;
//!     println!("Echoing on {}", endpoint);
//!
//!     let dispatch = server_dispatch(Arc::new(Echo), reactor.config());
//!     reactor.execute(dispatch)
//! }
//! ```

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod reactor;
pub mod session;
pub mod status;

// Re-exports
pub use audit::{AuditLog, ExceptionEvent};
pub use config::ReactorConfig;
pub use dispatch::{server_dispatch, EventDispatch, ServerEventDispatch};
pub use endpoint::ListenerEndpoint;
pub use error::{FaultKind, ReactorError, Result};
pub use handler::{ExceptionHandler, ServiceHandler};
pub use reactor::ListeningReactor;
pub use session::Session;
pub use status::ReactorStatus;
