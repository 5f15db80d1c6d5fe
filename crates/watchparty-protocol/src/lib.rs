//! Wire protocol for watch party rooms.
//!
//! This crate defines the vocabulary that clients, the connection adapter
//! and room actors share:
//!
//! - **Identity** ([`RoomId`], [`ParticipantId`], [`Sender`]): who and where.
//! - **Messages** ([`Message`], [`MessageKind`]): chat, host changes, sync
//!   traffic and playback control, as delivered to clients.
//! - **Client frames** ([`ClientMessage`], [`ClientHello`], [`ServerHello`]):
//!   what a client sends before and after it is admitted to a room, plus
//!   the payload validation that runs before anything reaches a room.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//!
//! The protocol layer has no behavior of its own. It doesn't know about
//! queues, tasks or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage / Message) → Room actor
//! ```

mod client;
mod codec;
mod error;
mod types;

pub use client::{ClientHello, ClientMessage, ServerHello};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{Message, MessageKind, ParticipantId, RoomId, Sender, now_millis};
