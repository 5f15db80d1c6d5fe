//! Unified error type for the WatchParty server.

use watchparty_protocol::ProtocolError;
use watchparty_room::RoomError;
use watchparty_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapping variant lets `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WatchPartyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The client did not complete its handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,
}
