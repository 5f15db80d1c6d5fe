//! Core protocol types: identifiers, message kinds and the outbound message.
//!
//! Everything here travels on the wire, so the serde attributes are part of
//! the contract with browser clients.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A participant's identifier, unique within a room.
///
/// Newtype over `u64` so it can't be confused with a [`RoomId`].
/// `#[serde(transparent)]` keeps it a plain number in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A room's identifier, unique process-wide among live rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// The participant a message originated from.
///
/// Serialized as the message's `user` field. Server-synthesized messages
/// (host changes, sync responses) carry no sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: ParticipantId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The declared kind of a [`Message`].
///
/// The wire names are the ones existing clients already send and expect,
/// hence the explicit `rename` on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Free-form chat. Anyone may send it; it is echoed back to the sender.
    #[serde(rename = "chat_message_broadcast")]
    Chat,

    /// Server → clients: the host changed. Never accepted from a client.
    #[serde(rename = "host_change_broadcast")]
    HostChanged,

    /// A participant asks for the current playback state. From the host,
    /// it is answered by the room itself.
    #[serde(rename = "sync_request")]
    SyncRequest,

    /// Server → host: the room's authoritative playback state.
    #[serde(rename = "sync_response")]
    SyncResponse,

    /// Host only: a new video was loaded.
    #[serde(rename = "video_url_change_broadcast")]
    VideoUrlChanged,

    /// Host only: playback started or paused.
    #[serde(rename = "video_play_pause_broadcast")]
    PlayPause,

    /// Host only: playback jumped to a new position.
    #[serde(rename = "video_seek_broadcast")]
    VideoSeek,
}

impl MessageKind {
    /// Returns `true` for playback-control kinds that only the current host
    /// may broadcast.
    pub fn requires_host(self) -> bool {
        matches!(self, Self::VideoUrlChanged | Self::PlayPause | Self::VideoSeek)
    }

    /// Returns `true` for kinds that only the server produces.
    pub fn is_server_only(self) -> bool {
        matches!(self, Self::HostChanged | Self::SyncResponse)
    }

    /// The wire name, for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat_message_broadcast",
            Self::HostChanged => "host_change_broadcast",
            Self::SyncRequest => "sync_request",
            Self::SyncResponse => "sync_response",
            Self::VideoUrlChanged => "video_url_change_broadcast",
            Self::PlayPause => "video_play_pause_broadcast",
            Self::VideoSeek => "video_seek_broadcast",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message as delivered to clients.
///
/// ```text
/// {
///   "user":       { "id": 7, "name": "Alice" },   // omitted when server-made
///   "type":       "video_seek_broadcast",
///   "data":       { "position": 93.5 },
///   "room_id":    123456789,
///   "time_stamp": 1760000000000
/// }
/// ```
///
/// `data` is free-form. Its shape is checked once, by
/// [`ClientMessage::validate`](crate::ClientMessage::validate), before the
/// message ever reaches a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "user", default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,

    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default)]
    pub data: Value,

    pub room_id: RoomId,

    /// Milliseconds since the Unix epoch, assigned by the server.
    #[serde(rename = "time_stamp")]
    pub timestamp: u64,
}

impl Message {
    /// Creates a server-originated message stamped with the current time.
    pub fn new(kind: MessageKind, data: Value, room_id: RoomId) -> Self {
        Self {
            sender: None,
            kind,
            data,
            room_id,
            timestamp: now_millis(),
        }
    }

    /// Attaches the originating participant.
    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// The originating participant's id, if any.
    pub fn sender_id(&self) -> Option<ParticipantId> {
        self.sender.as_ref().map(|s| s.id)
    }
}

/// Milliseconds since the Unix epoch. Clamps to 0 if the clock is set
/// before 1970.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
