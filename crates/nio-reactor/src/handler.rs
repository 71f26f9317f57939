//! Handler capabilities consumed by the reactor
//!
//! - [`ServiceHandler`] processes connection lifecycle events during dispatch
//! - [`ExceptionHandler`] decides whether a reactor-level fault is survivable

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::{ReactorError, Result};
use crate::session::Session;

/// Connection-level callbacks driven by [`ServerEventDispatch`](crate::dispatch::ServerEventDispatch)
///
/// Any `Err` returned from a callback ends the connection and is reported to
/// the reactor as a fault.
#[async_trait]
pub trait ServiceHandler: Send + Sync + 'static {
    /// A connection was accepted
    async fn connected(&self, session: &mut Session) -> Result<()>;

    /// Bytes arrived from the peer
    async fn input_ready(&self, session: &mut Session, data: Bytes) -> Result<()>;

    /// Queued output was flushed to the peer
    async fn output_ready(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    /// No input arrived within the socket timeout
    ///
    /// Closes the session unless overridden.
    async fn timeout(&self, session: &mut Session) -> Result<()> {
        session.close();
        Ok(())
    }

    /// The connection is gone; called exactly once per connected session
    async fn closed(&self, _session: &Session) {}
}

#[async_trait]
impl<H: ServiceHandler + ?Sized> ServiceHandler for Arc<H> {
    async fn connected(&self, session: &mut Session) -> Result<()> {
        (**self).connected(session).await
    }

    async fn input_ready(&self, session: &mut Session, data: Bytes) -> Result<()> {
        (**self).input_ready(session, data).await
    }

    async fn output_ready(&self, session: &mut Session) -> Result<()> {
        (**self).output_ready(session).await
    }

    async fn timeout(&self, session: &mut Session) -> Result<()> {
        (**self).timeout(session).await
    }

    async fn closed(&self, session: &Session) {
        (**self).closed(session).await
    }
}

/// Reactor-level fault callback
///
/// Return `true` to mark the fault handled and keep the reactor running,
/// `false` to make it fatal.
pub trait ExceptionHandler: Send + Sync + 'static {
    fn handle(&self, err: &ReactorError) -> bool;
}

impl<F> ExceptionHandler for F
where
    F: Fn(&ReactorError) -> bool + Send + Sync + 'static,
{
    fn handle(&self, err: &ReactorError) -> bool {
        self(err)
    }
}
