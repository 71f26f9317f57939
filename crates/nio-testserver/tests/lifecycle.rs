//! Test server lifecycle
//!
//! - construct/shutdown without start
//! - ephemeral endpoint after start
//! - captured failure from the dispatch thread
//! - clean start/shutdown without a captured exception
//! - bounded shutdown while sessions are blocked in dispatch
//! - shutdown returning at the join bound while a handler blocks
//! - audit log through an exception handler
//! - sequential lifecycles on fresh servers
//!
//! Run: cargo test -p nio-testserver --test lifecycle

mod helpers;

use helpers::{
    connect, init_tracing, round_trip, BlockingHandler, CountingHandler, EchoHandler,
    FailingHandler, IdleHandler,
};
use nio_reactor::{
    server_dispatch, FaultKind, ReactorConfig, ReactorError, ReactorStatus, ServiceHandler,
};
use nio_testserver::{DispatchFactory, HarnessError, TestServer, SHUTDOWN_JOIN_TIMEOUT};
use std::io::Read;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_shutdown_without_start() {
    init_tracing();
    let server = TestServer::new(ReactorConfig::default()).expect("create server");

    server.shutdown().expect("shutdown without start");

    assert_eq!(server.status(), ReactorStatus::ShutDown);
    assert!(server.listener_endpoint().is_none());
    assert!(server.exception().is_none());
    assert!(!server.join(Duration::from_millis(10)).unwrap());
}

#[test]
fn test_endpoint_after_start() {
    init_tracing();
    let server = TestServer::new(ReactorConfig::default()).unwrap();
    assert!(server.listener_endpoint().is_none());

    server.start(EchoHandler).unwrap();

    let endpoint = server.listener_endpoint().expect("endpoint after start");
    assert_ne!(endpoint.port(), 0);
    assert!(matches!(
        endpoint.address().ip(),
        IpAddr::V4(ip) if ip.is_unspecified() || ip.is_loopback()
    ));

    let mut client = connect(&server);
    assert_eq!(round_trip(&mut client, b"hello"), b"hello");
    assert_eq!(server.status(), ReactorStatus::Active);

    server.shutdown().unwrap();
    assert!(endpoint.is_closed());
    assert!(server.exception().is_none());
}

#[test]
fn test_second_start_rejected() {
    init_tracing();
    let server = TestServer::new(ReactorConfig::local_test()).unwrap();
    server.start(EchoHandler).unwrap();
    let first = server.listener_endpoint().unwrap();

    let err = server.start(EchoHandler).unwrap_err();
    assert!(matches!(err, HarnessError::AlreadyStarted));
    assert_eq!(server.listener_endpoint().unwrap(), first);

    server.shutdown().unwrap();
}

#[test]
fn test_failing_handler_error_is_captured() {
    init_tracing();
    let server = TestServer::new(ReactorConfig::local_test()).unwrap();
    server.start(FailingHandler).unwrap();

    let mut client = connect(&server);
    let mut buf = [0u8; 8];
    let _ = client.read(&mut buf);

    assert!(server.join(Duration::from_millis(1000)).unwrap());
    let err = server.exception().expect("dispatch failure captured");
    assert!(matches!(err, ReactorError::Handler { .. }));
    assert!(err.to_string().contains("connected rejected"));
    assert_eq!(server.status(), ReactorStatus::ShutDown);

    // Nothing left to stop, shutdown still succeeds
    server.shutdown().unwrap();
}

#[test]
fn test_immediate_shutdown_after_start_is_clean() {
    init_tracing();

    for _ in 0..20 {
        let server = TestServer::new(ReactorConfig::local_test()).unwrap();
        server.start(EchoHandler).unwrap();
        let endpoint = server.listener_endpoint().unwrap();

        server.shutdown().unwrap();

        assert!(server.join(Duration::from_secs(2)).unwrap());
        assert!(
            server.exception().is_none(),
            "clean shutdown reported {:?}",
            server.exception()
        );
        assert_eq!(server.status(), ReactorStatus::ShutDown);
        assert!(endpoint.is_closed());
    }
}

#[test]
fn test_shutdown_is_bounded_while_sessions_block() {
    init_tracing();
    let server = TestServer::new(ReactorConfig::local_test()).unwrap();
    server.start(IdleHandler).unwrap();

    let _clients: Vec<_> = (0..4).map(|_| connect(&server)).collect();
    std::thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    server.shutdown().unwrap();
    let elapsed = start.elapsed();

    assert!(
        elapsed < SHUTDOWN_JOIN_TIMEOUT + Duration::from_millis(200),
        "shutdown took too long: {:?}",
        elapsed
    );
    assert!(server.join(Duration::from_secs(2)).unwrap());
    assert_eq!(server.status(), ReactorStatus::ShutDown);
    assert!(server.exception().is_none());
}

#[test]
fn test_shutdown_returns_while_handler_blocks() {
    init_tracing();
    let server = TestServer::new(ReactorConfig::local_test()).unwrap();
    server.start(BlockingHandler(Duration::from_secs(2))).unwrap();

    let _client = connect(&server);
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    server.shutdown().unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= SHUTDOWN_JOIN_TIMEOUT, "returned early: {:?}", elapsed);
    assert!(
        elapsed < SHUTDOWN_JOIN_TIMEOUT + Duration::from_millis(200),
        "shutdown took too long: {:?}",
        elapsed
    );
    assert!(!server.join(Duration::ZERO).unwrap());
    assert_eq!(server.status(), ReactorStatus::ShuttingDown);

    // The reactor gives up on the blocked worker after its own grace periods
    assert!(server.join(Duration::from_secs(3)).unwrap());
    assert_eq!(server.status(), ReactorStatus::ShutDown);
    assert!(server.exception().is_none());
}

#[test]
fn test_audit_log_through_exception_handler() {
    init_tracing();
    let server = TestServer::new(ReactorConfig::local_test()).unwrap();
    let absorbed = Arc::new(AtomicUsize::new(0));
    let counter = absorbed.clone();
    server.set_exception_handler(move |err: &ReactorError| {
        counter.fetch_add(1, Ordering::SeqCst);
        err.kind() == FaultKind::Handler
    });
    server.start(FailingHandler).unwrap();
    assert!(server.audit_log().is_empty());

    for expected in 1..=3 {
        let mut client = connect(&server);
        let mut buf = [0u8; 8];
        let _ = client.read(&mut buf);

        let deadline = Instant::now() + Duration::from_secs(2);
        while server.audit_log().len() < expected && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    let audit = server.audit_log();
    assert_eq!(audit.len(), 3);
    assert!(audit.iter().all(|e| e.handled));
    assert!(audit.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(absorbed.load(Ordering::SeqCst), 3);
    assert_eq!(server.status(), ReactorStatus::Active);

    server.shutdown().unwrap();
    assert!(server.exception().is_none());
}

#[test]
fn test_sequential_lifecycles_bind_distinct_ports() {
    init_tracing();
    let mut ports = Vec::new();

    for _ in 0..2 {
        let server = TestServer::new(ReactorConfig::local_test()).unwrap();
        server.start(EchoHandler).unwrap();
        ports.push(server.listener_endpoint().unwrap().port());

        let mut client = connect(&server);
        assert_eq!(round_trip(&mut client, b"ping"), b"ping");

        server.shutdown().unwrap();
        assert!(server.exception().is_none());
    }

    assert_ne!(ports[0], ports[1]);
}

#[test]
fn test_custom_dispatch_factory() {
    init_tracing();
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let factory: DispatchFactory = Arc::new(
        move |handler: Arc<dyn ServiceHandler>, config: &ReactorConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            server_dispatch(handler, config)
        },
    );

    let server = TestServer::with_dispatch(ReactorConfig::local_test(), factory).unwrap();
    let handler = Arc::new(CountingHandler::default());
    server.start(handler.clone()).unwrap();

    let mut client = connect(&server);
    assert_eq!(round_trip(&mut client, b"abc"), b"abc");
    drop(client);

    server.shutdown().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(handler.connected.load(Ordering::SeqCst), 1);
    assert_eq!(handler.closed.load(Ordering::SeqCst), 1);
}
