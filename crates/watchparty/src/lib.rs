//! # WatchParty
//!
//! Synchronized group video playback over WebSockets.
//!
//! Participants connect, create or join a room, and the room relays chat
//! and playback commands in real time. One participant per room, the host,
//! controls playback; when the host leaves, the longest-standing member
//! takes over.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use watchparty::prelude::*;
//!
//! # async fn start() -> Result<(), WatchPartyError> {
//! let server = WatchPartyServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .room_config(RoomConfig::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::WatchPartyError;
pub use server::{DEFAULT_HANDSHAKE_TIMEOUT, WatchPartyServer, WatchPartyServerBuilder};

pub mod prelude {
    //! Everything needed to run a server or talk to one.

    pub use crate::{WatchPartyError, WatchPartyServer, WatchPartyServerBuilder};
    pub use watchparty_protocol::{
        ClientHello, ClientMessage, Codec, JsonCodec, Message, MessageKind, ParticipantId,
        RoomId, Sender, ServerHello,
    };
    pub use watchparty_room::{RoomConfig, RoomError, RoomInfo, RoomRegistry};
}
