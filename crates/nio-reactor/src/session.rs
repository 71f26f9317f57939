//! Per-connection session state handed to service handlers

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::net::SocketAddr;

/// State of one accepted connection
///
/// Handlers never touch the socket directly: they queue output with
/// [`Session::submit`] and ask for closure with [`Session::close`]. The
/// dispatch owns the stream and acts on both after every callback.
#[derive(Debug)]
pub struct Session {
    id: u64,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    outbound: BytesMut,
    close_requested: bool,
    attributes: HashMap<String, Bytes>,
    bytes_read: u64,
    bytes_written: u64,
}

impl Session {
    /// Create a session for a freshly accepted connection
    pub fn new(id: u64, remote_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self {
            id,
            remote_addr,
            local_addr,
            outbound: BytesMut::new(),
            close_requested: false,
            attributes: HashMap::new(),
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Reactor-unique session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Local address the connection was accepted on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queue bytes for writing
    pub fn submit(&mut self, data: &[u8]) {
        self.outbound.extend_from_slice(data);
    }

    /// Ask the dispatch to close the connection once output is flushed
    pub fn close(&mut self) {
        self.close_requested = true;
    }

    /// Whether closure was requested
    pub fn is_closing(&self) -> bool {
        self.close_requested
    }

    /// Whether output is queued
    pub fn has_pending_output(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Attach a named value to the session
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Look up a named value
    pub fn attribute(&self, name: &str) -> Option<&Bytes> {
        self.attributes.get(name)
    }

    /// Remove a named value
    pub fn remove_attribute(&mut self, name: &str) -> Option<Bytes> {
        self.attributes.remove(name)
    }

    /// Total bytes read from the peer
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Total bytes flushed to the peer
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    pub(crate) fn record_read(&mut self, n: usize) {
        self.bytes_read += n as u64;
    }

    pub(crate) fn record_written(&mut self, n: usize) {
        self.bytes_written += n as u64;
    }
}
