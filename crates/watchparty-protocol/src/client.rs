//! Frames sent by clients, and the handshake replies sent back to them.
//!
//! A connection starts with exactly one [`ClientHello`], answered by one
//! [`ServerHello`]. After that every inbound frame is a [`ClientMessage`]
//! and every outbound frame is a [`Message`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Message, MessageKind, ParticipantId, ProtocolError, RoomId, Sender};

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// The first frame on a connection: create a room, or join one.
///
/// Internally tagged, so the JSON looks like
/// `{ "type": "join_room", "room_id": 12, "name": "Bob" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientHello {
    /// Create a new room. The creator becomes its host.
    CreateRoom { name: String },

    /// Join an existing room by id.
    JoinRoom { room_id: RoomId, name: String },
}

impl ClientHello {
    /// The display name the client asked for.
    pub fn name(&self) -> &str {
        match self {
            Self::CreateRoom { name } | Self::JoinRoom { name, .. } => name,
        }
    }

    /// Rejects hellos with a blank display name.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.name().trim().is_empty() {
            return Err(ProtocolError::InvalidMessage("name required".into()));
        }
        Ok(())
    }
}

/// The server's answer to a [`ClientHello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerHello {
    /// The room was created and the caller is its host.
    RoomCreated {
        room_id: RoomId,
        user_id: ParticipantId,
        name: String,
    },

    /// The caller joined the room.
    RoomJoined {
        room_id: RoomId,
        user_id: ParticipantId,
        name: String,
    },

    /// The hello was rejected. `code` follows HTTP conventions
    /// (400 bad request, 404 room not found, 500 internal).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// An inbound frame from an admitted participant.
///
/// The client only supplies `type` and `data`. Sender, room and timestamp
/// are filled in by the server in [`into_message`](Self::into_message), so
/// a client can't impersonate anyone or backdate anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default)]
    pub data: Value,
}

impl ClientMessage {
    /// Checks that `data` matches what `kind` promises.
    ///
    /// Room actors trust a message's kind to match its payload, so this
    /// must pass before a message is submitted to a room.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self.kind {
            MessageKind::Chat => {
                let text = self.data.get("text").and_then(Value::as_str);
                match text {
                    Some(t) if !t.is_empty() => Ok(()),
                    _ => Err(invalid("chat message: missing or empty text")),
                }
            }
            MessageKind::VideoSeek => {
                if self.data.get("position").and_then(Value::as_f64).is_none() {
                    return Err(invalid("seek message: missing or invalid position"));
                }
                Ok(())
            }
            MessageKind::PlayPause => {
                if self.data.get("is_playing").and_then(Value::as_bool).is_none() {
                    return Err(invalid("play/pause message: missing is_playing"));
                }
                match self.data.get("position") {
                    None => Ok(()),
                    Some(p) if p.is_number() => Ok(()),
                    Some(_) => Err(invalid("play/pause message: invalid position")),
                }
            }
            MessageKind::VideoUrlChanged => {
                let url = self.data.get("url").and_then(Value::as_str);
                match url {
                    Some(u) if !u.trim().is_empty() => Ok(()),
                    _ => Err(invalid("video url message: missing or empty url")),
                }
            }
            MessageKind::SyncRequest => Ok(()),
            kind @ (MessageKind::HostChanged | MessageKind::SyncResponse) => {
                Err(invalid(&format!("{kind} is server-only")))
            }
        }
    }

    /// Stamps the frame with its sender, room and server time.
    pub fn into_message(self, sender: Sender, room_id: RoomId, timestamp: u64) -> Message {
        Message {
            sender: Some(sender),
            kind: self.kind,
            data: self.data,
            room_id,
            timestamp,
        }
    }
}

fn invalid(reason: &str) -> ProtocolError {
    ProtocolError::InvalidMessage(reason.to_string())
}
