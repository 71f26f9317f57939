//! Test server - one reactor, one background dispatch thread
//!
//! [`TestServer`] binds an ephemeral port, runs the reactor's blocking
//! dispatch loop on its own thread, and lets the test poll or stop it.
//! Failures on the background thread are captured, never rethrown; read them
//! with [`TestServer::exception`].

use nio_reactor::{
    server_dispatch, EventDispatch, ExceptionEvent, ExceptionHandler, ListenerEndpoint,
    ListeningReactor, ReactorConfig, ReactorError, ReactorStatus, ServiceHandler,
};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, Result};

/// Worker threads given to every test server reactor
pub const WORKER_COUNT: usize = 2;

/// How long `shutdown` waits for the dispatch thread
pub const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Builds the dispatch strategy `start` hands to the reactor
pub type DispatchFactory =
    Arc<dyn Fn(Arc<dyn ServiceHandler>, &ReactorConfig) -> Arc<dyn EventDispatch> + Send + Sync>;

/// Completion state shared with the dispatch thread
#[derive(Default)]
struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
    error: OnceLock<ReactorError>,
}

impl Completion {
    fn finish(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    /// Wait up to `timeout`; returns whether the thread finished
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.cond.wait_until(&mut done, deadline).timed_out() {
                break;
            }
        }
        *done
    }
}

/// Marks completion even when the dispatch thread unwinds
struct CompletionGuard(Arc<Completion>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

struct ReactorThread {
    handle: Mutex<Option<JoinHandle<()>>>,
    completion: Arc<Completion>,
}

/// Trivial test server over a [`ListeningReactor`]
pub struct TestServer {
    reactor: Arc<ListeningReactor>,
    config: ReactorConfig,
    dispatch_factory: DispatchFactory,
    started: AtomicBool,
    endpoint: OnceLock<ListenerEndpoint>,
    thread: OnceLock<ReactorThread>,
}

impl TestServer {
    /// Create a test server using the default server dispatch
    ///
    /// Fails with an I/O error if the reactor cannot allocate its workers.
    pub fn new(config: ReactorConfig) -> Result<Self> {
        Self::with_dispatch(config, Arc::new(server_dispatch))
    }

    /// Create a test server with a custom dispatch strategy
    pub fn with_dispatch(config: ReactorConfig, dispatch_factory: DispatchFactory) -> Result<Self> {
        let reactor = ListeningReactor::new(WORKER_COUNT, config.clone())?;
        Ok(Self {
            reactor: Arc::new(reactor),
            config,
            dispatch_factory,
            started: AtomicBool::new(false),
            endpoint: OnceLock::new(),
            thread: OnceLock::new(),
        })
    }

    /// Configuration passed to the reactor
    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Install a reactor-level fault callback
    pub fn set_exception_handler(&self, handler: impl ExceptionHandler) {
        self.reactor.set_exception_handler(handler);
    }

    /// Bind an ephemeral port and start dispatching on a background thread
    ///
    /// Returns as soon as the thread is spawned. A harness starts at most once.
    /// If the thread cannot be spawned the reactor is shut down and the
    /// harness stays terminated.
    pub fn start(&self, handler: impl ServiceHandler) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(HarnessError::AlreadyStarted);
        }

        let endpoint = match self.reactor.listen(self.config.ephemeral_address()) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.started.store(false, Ordering::Release);
                return Err(e.into());
            }
        };
        let _ = self.endpoint.set(endpoint.clone());

        let dispatch = (self.dispatch_factory)(Arc::new(handler), &self.config);
        let completion = Arc::new(Completion::default());
        let reactor = self.reactor.clone();
        let thread_completion = completion.clone();

        let handle = std::thread::Builder::new()
            .name(format!("nio-testserver-{}", endpoint.port()))
            .spawn(move || {
                let _guard = CompletionGuard(thread_completion.clone());
                if let Err(e) = reactor.execute(dispatch) {
                    warn!("Test server dispatch loop failed: {}", e);
                    let _ = thread_completion.error.set(e);
                }
            })
            .map_err(|e| self.abandon_start(e))?;

        let _ = self.thread.set(ReactorThread {
            handle: Mutex::new(Some(handle)),
            completion,
        });

        info!("Test server started on {}", endpoint);
        Ok(())
    }

    /// Tear down a start that bound its listener but has no dispatch thread
    fn abandon_start(&self, err: std::io::Error) -> HarnessError {
        warn!("Failed to spawn test server dispatch thread: {}", err);
        if let Err(e) = self.reactor.shutdown() {
            debug!("Reactor shutdown after failed start: {}", e);
        }
        HarnessError::Spawn(err)
    }

    /// Bound endpoint; `None` before `start`
    pub fn listener_endpoint(&self) -> Option<ListenerEndpoint> {
        self.endpoint.get().cloned()
    }

    /// Reactor lifecycle state
    pub fn status(&self) -> ReactorStatus {
        self.reactor.status()
    }

    /// Faults the reactor recorded, oldest first
    pub fn audit_log(&self) -> Vec<ExceptionEvent> {
        self.reactor.audit_log()
    }

    /// Wait up to `timeout` for the dispatch thread to finish
    ///
    /// Returns `Ok(true)` once it has finished and `Ok(false)` on timeout or
    /// when the server was never started. Fails with
    /// [`HarnessError::Interrupted`] if the thread died by panicking.
    pub fn join(&self, timeout: Duration) -> Result<bool> {
        let Some(thread) = self.thread.get() else {
            return Ok(false);
        };

        if !thread.completion.wait(timeout) {
            return Ok(false);
        }

        let handle = thread.handle.lock().take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|panic| HarnessError::Interrupted(panic_message(panic.as_ref())))?;
        }
        Ok(true)
    }

    /// Error captured from the dispatch thread, if any
    pub fn exception(&self) -> Option<&ReactorError> {
        self.thread.get().and_then(|t| t.completion.error.get())
    }

    /// Request reactor shutdown and wait up to 500ms for the dispatch thread
    ///
    /// An interrupted join is ignored; only a failed shutdown signal is an error.
    pub fn shutdown(&self) -> Result<()> {
        self.reactor.shutdown()?;

        match self.join(SHUTDOWN_JOIN_TIMEOUT) {
            Ok(true) => debug!("Test server dispatch thread finished"),
            Ok(false) if self.thread.get().is_some() => warn!(
                "Test server dispatch thread still running after {}ms",
                SHUTDOWN_JOIN_TIMEOUT.as_millis()
            ),
            Ok(false) => {}
            Err(e) => debug!("Ignoring interrupted join during shutdown: {}", e),
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Err(e) = self.reactor.shutdown() {
            debug!("Test server shutdown on drop failed: {}", e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "reactor thread panicked".to_string()
    }
}
