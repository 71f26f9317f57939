//! Event dispatch strategies
//!
//! An [`EventDispatch`] owns one accepted connection for its whole life. The
//! reactor spawns one dispatch future per connection and treats an `Err` (or a
//! panic) as a reactor fault.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::config::ReactorConfig;
use crate::error::Result;
use crate::handler::ServiceHandler;
use crate::session::Session;

/// Strategy driving a single connection
#[async_trait]
pub trait EventDispatch: Send + Sync + 'static {
    /// Drive `stream` until it closes or `shutdown` flips to `true`
    async fn dispatch(
        &self,
        stream: TcpStream,
        session: Session,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>;
}

/// Default server-side dispatch: feeds socket events to a [`ServiceHandler`]
pub struct ServerEventDispatch<H> {
    handler: H,
    read_buffer_size: usize,
    socket_timeout: Duration,
}

impl<H: ServiceHandler> ServerEventDispatch<H> {
    /// Create a dispatch for `handler` using the buffer and timeout settings of `config`
    pub fn new(handler: H, config: &ReactorConfig) -> Self {
        Self {
            handler,
            read_buffer_size: config.read_buffer_size,
            socket_timeout: config.socket_timeout(),
        }
    }

    /// The wrapped handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    async fn drive(
        &self,
        stream: &mut TcpStream,
        session: &mut Session,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        self.handler.connected(session).await?;
        self.flush(stream, session).await?;

        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            if session.is_closing() {
                debug!(session = session.id(), "Session closed by handler");
                return Ok(());
            }
            if *shutdown.borrow_and_update() {
                debug!(session = session.id(), "Session closed by reactor shutdown");
                return Ok(());
            }

            let read = tokio::select! {
                _ = shutdown.changed() => None,
                read = tokio::time::timeout(self.socket_timeout, stream.read(&mut buf)) => Some(read),
            };

            match read {
                // Shutdown flipped or the reactor is gone; re-checked at the top
                None => {
                    if shutdown.has_changed().is_err() {
                        return Ok(());
                    }
                    continue;
                }
                Some(Err(_elapsed)) => {
                    trace!(session = session.id(), "Socket timeout");
                    self.handler.timeout(session).await?;
                }
                Some(Ok(Ok(0))) => {
                    debug!(session = session.id(), "Peer closed connection");
                    return Ok(());
                }
                Some(Ok(Ok(n))) => {
                    session.record_read(n);
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    self.handler.input_ready(session, data).await?;
                }
                Some(Ok(Err(e))) => return Err(e.into()),
            }

            self.flush(stream, session).await?;
        }
    }

    async fn flush(&self, stream: &mut TcpStream, session: &mut Session) -> Result<()> {
        while session.has_pending_output() {
            let out = session.take_outbound();
            stream.write_all(&out).await?;
            session.record_written(out.len());
            self.handler.output_ready(session).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<H: ServiceHandler> EventDispatch for ServerEventDispatch<H> {
    async fn dispatch(
        &self,
        mut stream: TcpStream,
        mut session: Session,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let result = self.drive(&mut stream, &mut session, &mut shutdown).await;

        self.handler.closed(&session).await;
        if let Err(e) = stream.shutdown().await {
            trace!(session = session.id(), "Socket shutdown failed: {}", e);
        }

        debug!(
            session = session.id(),
            bytes_read = session.bytes_read(),
            bytes_written = session.bytes_written(),
            "Session finished"
        );
        result
    }
}

/// Build the default dispatch for a shared handler
pub fn server_dispatch(
    handler: Arc<dyn ServiceHandler>,
    config: &ReactorConfig,
) -> Arc<dyn EventDispatch> {
    Arc::new(ServerEventDispatch::new(handler, config))
}
