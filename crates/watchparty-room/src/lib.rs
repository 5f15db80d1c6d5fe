//! Rooms for WatchParty.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! member list, host, playback state, and chat history. Everything else
//! talks to it through a [`RoomHandle`].
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms, resolves ids, tears rooms down
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Participant`]: a member and the write end of its outbound queue
//! - [`PlaybackState`]: video url, play/pause flag, and position
//! - [`RoomConfig`]: queue capacities and history limit

mod config;
mod error;
mod participant;
mod playback;
mod registry;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use participant::{OutboundReceiver, OutboundSender, Participant};
pub use playback::PlaybackState;
pub use registry::{MAX_ROOM_ID, RoomRegistry};
pub use room::{RoomCommand, RoomHandle, RoomInfo};
