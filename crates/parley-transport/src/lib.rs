//! Transport layer for Parley.
//!
//! The server core never touches sockets directly. It accepts
//! [`PendingConnection`]s from a [`Transport`], finishes their handshake
//! off the accept loop, and moves whole binary messages over the
//! resulting [`Connection`]s; framing into `(component, message type, payload)` happens
//! one layer up in `parley-protocol`.
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
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Identity of one connected client.
///
/// Every accepted connection gets a fresh id that is never reused for the
/// lifetime of the process, so components can key per-client state on it
/// without worrying about a reconnecting client inheriting stale entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Wraps a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// An accepted socket whose handshake has not run yet.
    type Pending: PendingConnection<Connection = Self::Connection>;

    /// Waits for the next incoming socket.
    ///
    /// Returns as soon as the socket is accepted. The protocol handshake
    /// is left to [`PendingConnection::handshake`], so a peer that never
    /// completes it cannot stall the accept loop.
    async fn accept(&mut self) -> Result<Self::Pending, TransportError>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A socket accepted by a [`Transport`] that still has to complete its
/// protocol handshake.
pub trait PendingConnection: Send + 'static {
    /// The connection produced by a successful handshake.
    type Connection: Connection;

    /// Returns the remote address of the peer.
    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake. Callers bound it with their own timeout.
    async fn handshake(self) -> Result<Self::Connection, TransportError>;
}

/// One client connection carrying whole binary messages.
///
/// `send` and `recv` may be called concurrently from different tasks:
/// a connection handler typically parks in `recv` while a writer task
/// drains the client's outbound queue through `send`.
pub trait Connection: Send + Sync + 'static {
    /// Sends one message to the peer.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receives the next message from the peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// Returns the id assigned to this connection at accept time.
    fn id(&self) -> ClientId;

    /// Returns the remote address of the peer.
    fn peer_addr(&self) -> SocketAddr;
}
