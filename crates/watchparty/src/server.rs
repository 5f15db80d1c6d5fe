//! `WatchPartyServer` builder and server loop.
//!
//! This is the entry point for running a watch party server. It ties
//! together all the layers: transport → protocol → room.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use watchparty_protocol::JsonCodec;
use watchparty_room::{RoomConfig, RoomRegistry};
use watchparty_transport::{Incoming, Transport, WebSocketTransport};

use crate::WatchPartyError;
use crate::handler::handle_connection;

/// Default time a client has to finish the WebSocket upgrade and send its
/// hello frame.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: RoomRegistry,
    pub(crate) codec: JsonCodec,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a watch party server.
///
/// # Example
///
/// ```rust,no_run
/// use watchparty::prelude::*;
///
/// # async fn start() -> Result<(), WatchPartyError> {
/// let server = WatchPartyServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct WatchPartyServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    handshake_timeout: Duration,
}

impl WatchPartyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration shared by every room.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the time limit for the WebSocket upgrade and for the client's
    /// first message.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and creates the room registry.
    pub async fn build(self) -> Result<WatchPartyServer, WatchPartyError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: RoomRegistry::new(self.room_config),
            codec: JsonCodec,
            handshake_timeout: self.handshake_timeout,
        });

        Ok(WatchPartyServer { transport, state })
    }
}

impl Default for WatchPartyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound watch party server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WatchPartyServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl WatchPartyServer {
    /// Starts building a server with default settings.
    pub fn builder() -> WatchPartyServerBuilder {
        WatchPartyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, WatchPartyError> {
        Ok(self.transport.local_addr()?)
    }

    /// The registry every connection on this server shares.
    pub fn registry(&self) -> &RoomRegistry {
        &self.state.registry
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection is upgraded and handled on its own task.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), WatchPartyError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "watch party server running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let conn = match tokio::time::timeout(
                            state.handshake_timeout,
                            incoming.upgrade(),
                        )
                        .await
                        {
                            Ok(Ok(conn)) => conn,
                            Ok(Err(e)) => {
                                tracing::debug!(%peer, error = %e, "upgrade failed");
                                return;
                            }
                            Err(_) => {
                                tracing::debug!(%peer, "upgrade timed out");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(%peer, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
