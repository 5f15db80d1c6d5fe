//! Transport layer for WatchParty.
//!
//! Provides the [`Transport`], [`Incoming`], and [`Connection`] traits that
//! the server's accept loop and connection handler are written against.
//!
//! Accepting is split in two steps: [`Transport::accept`] hands back the raw
//! incoming connection, and [`Incoming::upgrade`] performs the protocol
//! handshake. The upgrade runs on the connection's own task so a slow
//! client never stalls the accept loop.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketIncoming, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// Not-yet-upgraded connection produced by [`accept`](Self::accept).
    type Incoming: Incoming<Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// A connection that has been accepted but not yet upgraded.
pub trait Incoming: Send + 'static {
    type Connection: Connection<Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Performs the protocol handshake.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;

    fn peer_addr(&self) -> SocketAddr;
}

/// A single connection that can send and receive messages.
///
/// Sending and receiving are independent: one task may wait in
/// [`recv`](Self::recv) while another calls [`send`](Self::send).
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
