//! Stock service handlers

use async_trait::async_trait;
use bytes::Bytes;
use nio_reactor::{ReactorError, Result, ServiceHandler, Session};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Writes every input back to the peer
pub struct EchoHandler;

#[async_trait]
impl ServiceHandler for EchoHandler {
    async fn connected(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    async fn input_ready(&self, session: &mut Session, data: Bytes) -> Result<()> {
        session.submit(&data);
        Ok(())
    }
}

/// Fails on every callback
pub struct FailingHandler;

#[async_trait]
impl ServiceHandler for FailingHandler {
    async fn connected(&self, session: &mut Session) -> Result<()> {
        Err(ReactorError::handler(session.id(), "connected rejected"))
    }

    async fn input_ready(&self, session: &mut Session, _data: Bytes) -> Result<()> {
        Err(ReactorError::handler(session.id(), "input rejected"))
    }

    async fn output_ready(&self, session: &mut Session) -> Result<()> {
        Err(ReactorError::handler(session.id(), "output rejected"))
    }

    async fn timeout(&self, session: &mut Session) -> Result<()> {
        Err(ReactorError::handler(session.id(), "timeout rejected"))
    }
}

/// Accepts connections and never answers or times out on its own
pub struct IdleHandler;

#[async_trait]
impl ServiceHandler for IdleHandler {
    async fn connected(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    async fn input_ready(&self, _session: &mut Session, _data: Bytes) -> Result<()> {
        Ok(())
    }

    async fn timeout(&self, _session: &mut Session) -> Result<()> {
        Ok(())
    }
}

/// Parks its worker thread inside `connected`, out of reach of shutdown
pub struct BlockingHandler(pub Duration);

#[async_trait]
impl ServiceHandler for BlockingHandler {
    async fn connected(&self, _session: &mut Session) -> Result<()> {
        std::thread::sleep(self.0);
        Ok(())
    }

    async fn input_ready(&self, _session: &mut Session, _data: Bytes) -> Result<()> {
        Ok(())
    }
}

/// Echo handler that counts lifecycle callbacks
#[derive(Default)]
pub struct CountingHandler {
    pub connected: AtomicUsize,
    pub closed: AtomicUsize,
}

#[async_trait]
impl ServiceHandler for CountingHandler {
    async fn connected(&self, _session: &mut Session) -> Result<()> {
        self.connected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn input_ready(&self, session: &mut Session, data: Bytes) -> Result<()> {
        session.submit(&data);
        Ok(())
    }

    async fn closed(&self, _session: &Session) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
