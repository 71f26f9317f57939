//! Listening reactor - owns the worker runtime, the listeners, and the
//! dispatch loop.
//!
//! The reactor is driven from a plain thread: [`ListeningReactor::execute`]
//! blocks until shutdown is requested or a fault goes unhandled, while
//! [`ListeningReactor::shutdown`] may be called from any other thread.

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, info, warn};

use crate::audit::{AuditLog, ExceptionEvent};
use crate::config::ReactorConfig;
use crate::dispatch::EventDispatch;
use crate::endpoint::ListenerEndpoint;
use crate::error::{ReactorError, Result};
use crate::handler::ExceptionHandler;
use crate::session::Session;
use crate::status::ReactorStatus;

/// Pause after a failed accept so a persistent error cannot spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Everything an accept loop needs once the dispatch loop is running
#[derive(Clone)]
struct AcceptContext {
    dispatch: Arc<dyn EventDispatch>,
    faults: mpsc::UnboundedSender<ReactorError>,
    shutdown: watch::Receiver<bool>,
    permits: Arc<Semaphore>,
    next_session: Arc<AtomicU64>,
    tcp_nodelay: bool,
}

impl AcceptContext {
    fn spawn_session(&self, stream: TcpStream, remote: SocketAddr) {
        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            warn!("Connection limit reached, dropping connection from {}", remote);
            return;
        };

        if let Err(e) = stream.set_nodelay(self.tcp_nodelay) {
            debug!("Failed to set TCP_NODELAY for {}: {}", remote, e);
        }
        let local = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = self.faults.send(e.into());
                return;
            }
        };

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, remote, local);
        let dispatch = self.dispatch.clone();
        let faults = self.faults.clone();
        let shutdown = self.shutdown.clone();

        debug!(session = id, "Accepted connection from {}", remote);

        tokio::spawn(async move {
            let _permit = permit;
            let outcome = AssertUnwindSafe(dispatch.dispatch(stream, session, shutdown))
                .catch_unwind()
                .await;

            let fault = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(panic) => Some(ReactorError::Runtime(format!(
                    "session {} panicked: {}",
                    id,
                    panic_message(panic.as_ref())
                ))),
            };

            if let Some(fault) = fault {
                debug!(session = id, "Session failed: {}", fault);
                let _ = faults.send(fault);
            }
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn accept_loop(listener: TcpListener, endpoint: ListenerEndpoint, mut ctx: AcceptContext) {
    debug!("Accepting on {}", endpoint);

    loop {
        if *ctx.shutdown.borrow_and_update() {
            break;
        }

        let accepted = tokio::select! {
            changed = ctx.shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, remote)) => ctx.spawn_session(stream, remote),
            Err(e) => {
                warn!("Failed to accept on {}: {}", endpoint, e);
                let _ = ctx.faults.send(e.into());
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }

    endpoint.close();
    debug!("Stopped accepting on {}", endpoint);
}

/// Leaves the reactor `ShutDown` with its endpoints closed however `execute` exits
struct ExecuteGuard<'a>(&'a ListeningReactor);

impl Drop for ExecuteGuard<'_> {
    fn drop(&mut self) {
        let reactor = self.0;
        reactor.active.lock().take();
        reactor.pending.lock().clear();
        for endpoint in reactor.endpoints.read().iter() {
            endpoint.close();
        }
        *reactor.status.write() = ReactorStatus::ShutDown;
    }
}

/// A multi-worker reactor accepting TCP connections on any number of endpoints
pub struct ListeningReactor {
    worker_count: usize,
    config: ReactorConfig,
    /// Taken by `execute`, or dropped by a shutdown that happens first
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    status: RwLock<ReactorStatus>,
    shutdown_tx: watch::Sender<bool>,
    /// Listeners bound before the dispatch loop started
    pending: Mutex<Vec<(ListenerEndpoint, TcpListener)>>,
    endpoints: RwLock<Vec<ListenerEndpoint>>,
    /// Present only while the dispatch loop runs
    active: Mutex<Option<AcceptContext>>,
    exception_handler: RwLock<Option<Arc<dyn ExceptionHandler>>>,
    audit_log: AuditLog,
}

impl ListeningReactor {
    /// Create a reactor with `worker_count` I/O worker threads
    ///
    /// Fails with [`ReactorError::Io`] when the worker runtime cannot be
    /// allocated.
    pub fn new(worker_count: usize, config: ReactorConfig) -> Result<Self> {
        if worker_count == 0 {
            return Err(ReactorError::Config("worker_count must be > 0".into()));
        }
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_count)
            .thread_name("nio-reactor-worker")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, _) = watch::channel(false);

        debug!("Reactor created with {} workers", worker_count);

        Ok(Self {
            worker_count,
            config,
            runtime: Mutex::new(Some(runtime)),
            handle,
            status: RwLock::new(ReactorStatus::Inactive),
            shutdown_tx,
            pending: Mutex::new(Vec::new()),
            endpoints: RwLock::new(Vec::new()),
            active: Mutex::new(None),
            exception_handler: RwLock::new(None),
            audit_log: AuditLog::new(),
        })
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Configuration the reactor was built with
    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn status(&self) -> ReactorStatus {
        *self.status.read()
    }

    /// All endpoints ever bound, in bind order
    pub fn endpoints(&self) -> Vec<ListenerEndpoint> {
        self.endpoints.read().clone()
    }

    /// Snapshot of recorded faults, oldest first
    pub fn audit_log(&self) -> Vec<ExceptionEvent> {
        self.audit_log.snapshot()
    }

    /// Install the reactor-level fault callback, replacing any previous one
    pub fn set_exception_handler(&self, handler: impl ExceptionHandler) {
        *self.exception_handler.write() = Some(Arc::new(handler));
    }

    /// Bind a listener on `addr`
    ///
    /// The socket is bound immediately so the returned endpoint carries the
    /// OS-assigned port. Connections are accepted once the dispatch loop runs.
    pub fn listen(&self, addr: SocketAddr) -> Result<ListenerEndpoint> {
        if self.status().is_terminating() {
            return Err(ReactorError::ShutDown);
        }

        let std_listener = std::net::TcpListener::bind(addr)?;
        std_listener.set_nonblocking(true)?;
        let listener = {
            let _guard = self.handle.enter();
            TcpListener::from_std(std_listener)?
        };
        let endpoint = ListenerEndpoint::new(listener.local_addr()?);

        let active = self.active.lock();
        // Shutdown may have won the race while the socket was being bound
        if self.status().is_terminating() {
            return Err(ReactorError::ShutDown);
        }

        info!("Listening on {}", endpoint);
        self.endpoints.write().push(endpoint.clone());

        match active.as_ref() {
            Some(ctx) => {
                self.handle
                    .spawn(accept_loop(listener, endpoint.clone(), ctx.clone()));
            }
            None => self.pending.lock().push((endpoint.clone(), listener)),
        }

        Ok(endpoint)
    }

    /// Run the dispatch loop on the calling thread
    ///
    /// Returns `Ok(())` after a requested shutdown, including one that
    /// arrived before the loop was entered, or the first fault the exception
    /// handler declined.
    pub fn execute(&self, dispatch: Arc<dyn EventDispatch>) -> Result<()> {
        let all_permits = u32::try_from(self.config.max_connections)
            .map_err(|_| ReactorError::Config("max_connections exceeds u32::MAX".into()))?;

        let (runtime, mut shutdown_rx) = {
            let mut status = self.status.write();
            match *status {
                ReactorStatus::Inactive => {}
                ReactorStatus::Active => return Err(ReactorError::AlreadyStarted),
                ReactorStatus::ShuttingDown | ReactorStatus::ShutDown => {
                    debug!("Shutdown requested before dispatch started");
                    return Ok(());
                }
            }
            let runtime = self
                .runtime
                .lock()
                .take()
                .ok_or(ReactorError::AlreadyStarted)?;
            // Subscribe before going Active so a racing shutdown always has a receiver
            let shutdown_rx = self.shutdown_tx.subscribe();
            *status = ReactorStatus::Active;
            (runtime, shutdown_rx)
        };
        let _finished = ExecuteGuard(self);

        info!("Reactor dispatch loop started with {} workers", self.worker_count);

        let (fault_tx, mut fault_rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(self.config.max_connections));
        let ctx = AcceptContext {
            dispatch,
            faults: fault_tx,
            shutdown: shutdown_rx.clone(),
            permits: permits.clone(),
            next_session: Arc::new(AtomicU64::new(1)),
            tcp_nodelay: self.config.tcp_nodelay,
        };

        {
            let mut active = self.active.lock();
            for (endpoint, listener) in self.pending.lock().drain(..) {
                runtime.spawn(accept_loop(listener, endpoint, ctx.clone()));
            }
            *active = Some(ctx);
        }

        let outcome: Result<()> = runtime.block_on(async {
            loop {
                if *shutdown_rx.borrow_and_update() {
                    return Ok(());
                }
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                    }
                    Some(fault) = fault_rx.recv() => {
                        if !self.handle_fault(&fault) {
                            return Err(fault);
                        }
                    }
                }
            }
        });

        *self.status.write() = ReactorStatus::ShuttingDown;
        self.shutdown_tx.send_replace(true);
        self.active.lock().take();

        // Give sessions the grace period to observe the signal and run their close callbacks
        let grace = self.config.shutdown_grace();
        let drained = runtime.block_on(async {
            tokio::time::timeout(grace, permits.acquire_many(all_permits))
                .await
                .is_ok()
        });
        if !drained {
            warn!("Sessions still open after {}ms grace period", grace.as_millis());
        }

        // Faults raised while draining still belong in the audit log
        while let Ok(fault) = fault_rx.try_recv() {
            self.handle_fault(&fault);
        }

        runtime.shutdown_timeout(grace);

        match &outcome {
            Ok(()) => info!("Reactor shut down"),
            Err(e) => warn!("Reactor stopped on unhandled fault: {}", e),
        }
        outcome
    }

    /// Request shutdown
    ///
    /// Before `execute` this closes pending listeners and frees the workers
    /// directly. While active it signals the dispatch loop, which winds down
    /// asynchronously. Repeated calls are no-ops.
    pub fn shutdown(&self) -> Result<()> {
        let mut status = self.status.write();
        match *status {
            ReactorStatus::Inactive => {
                *status = ReactorStatus::ShutDown;
                drop(status);

                self.pending.lock().clear();
                for endpoint in self.endpoints.read().iter() {
                    endpoint.close();
                }
                if let Some(runtime) = self.runtime.lock().take() {
                    runtime.shutdown_background();
                }
                info!("Reactor shut down before dispatch started");
                Ok(())
            }
            ReactorStatus::Active => {
                *status = ReactorStatus::ShuttingDown;
                drop(status);

                info!("Reactor shutdown requested");
                self.shutdown_tx.send(true).map_err(|_| {
                    ReactorError::Io(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "dispatch loop is not listening for shutdown",
                    ))
                })
            }
            ReactorStatus::ShuttingDown | ReactorStatus::ShutDown => Ok(()),
        }
    }

    /// Record a fault and decide whether the reactor survives it
    fn handle_fault(&self, fault: &ReactorError) -> bool {
        let handler = self.exception_handler.read().clone();
        let handled = handler.map(|h| h.handle(fault)).unwrap_or(false);

        self.audit_log.record(ExceptionEvent::new(fault, handled));
        let recorded = self.audit_log.len();
        if handled {
            debug!(recorded, "Reactor fault handled: {}", fault);
        } else {
            warn!(recorded, "Unhandled reactor fault: {}", fault);
        }
        handled
    }
}

impl Drop for ListeningReactor {
    fn drop(&mut self) {
        // Dropping a runtime inside an async context panics
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}
