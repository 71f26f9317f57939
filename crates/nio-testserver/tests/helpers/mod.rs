//! Shared fixtures for test server integration tests

pub mod handlers;

pub use handlers::{BlockingHandler, CountingHandler, EchoHandler, FailingHandler, IdleHandler};

use nio_testserver::TestServer;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

/// Install a test subscriber once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("nio_testserver=debug,nio_reactor=info")
        .with_test_writer()
        .try_init();
}

/// Loopback address of a started server, whatever interface it bound
pub fn loopback(server: &TestServer) -> SocketAddr {
    let endpoint = server
        .listener_endpoint()
        .expect("server has not been started");
    SocketAddr::from((Ipv4Addr::LOCALHOST, endpoint.port()))
}

/// Connect a blocking client with a read timeout
pub fn connect(server: &TestServer) -> TcpStream {
    let stream = TcpStream::connect(loopback(server)).expect("connect to test server");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set read timeout");
    stream
}

/// Send `payload` and read back exactly as many bytes
pub fn round_trip(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).expect("write payload");
    let mut buf = vec![0u8; payload.len()];
    stream.read_exact(&mut buf).expect("read echo");
    buf
}
