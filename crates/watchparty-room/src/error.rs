//! Error types for the room layer.

use watchparty_protocol::RoomId;

/// Errors surfaced to callers of the registry and of room handles.
///
/// Authority violations and full outbound queues are deliberately absent:
/// the room handles those itself (drop, and log) without telling anyone.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist, or its actor has already stopped.
    #[error("room {0} not found")]
    NotFound(RoomId),
}
