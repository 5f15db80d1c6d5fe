//! Room registry: creates rooms, resolves room ids, and tears rooms down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use rand::Rng;
use tokio::sync::{RwLock, mpsc, oneshot};
use watchparty_protocol::RoomId;

use crate::room::{TeardownTicket, spawn_room};
use crate::{Participant, RoomConfig, RoomError, RoomHandle};

/// Largest room id handed out: the biggest integer a JSON number holds
/// exactly in a JavaScript client.
pub const MAX_ROOM_ID: u64 = (1 << 53) - 1;

struct RoomEntry {
    handle: RoomHandle,
    /// Shared with the actor's teardown ticket.
    guard: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
}

struct RegistryInner {
    rooms: RwLock<HashMap<RoomId, RoomEntry>>,
    config: RoomConfig,
    teardown_tx: mpsc::UnboundedSender<TeardownTicket>,
}

/// The set of live rooms, keyed by [`RoomId`].
///
/// Cloning shares the same registry. A room is removed exactly once,
/// either when its actor reports it empty or through
/// [`request_teardown`](Self::request_teardown), whichever comes first.
/// Dropping the last clone closes every room.
///
/// Must be created inside a Tokio runtime: it spawns the task that
/// receives teardown requests from room actors.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

impl RoomRegistry {
    /// Creates an empty registry. Must be called inside a Tokio runtime.
    pub fn new(config: RoomConfig) -> Self {
        let (teardown_tx, teardown_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(RegistryInner {
            rooms: RwLock::new(HashMap::new()),
            config,
            teardown_tx,
        });
        tokio::spawn(teardown_listener(Arc::downgrade(&inner), teardown_rx));
        Self { inner }
    }

    /// Configuration applied to every room this registry creates.
    pub fn config(&self) -> &RoomConfig {
        &self.inner.config
    }

    /// Creates a room with `host` as its host and sole member, and
    /// returns its freshly allocated id.
    pub async fn create_room(&self, host: Participant) -> RoomId {
        let host_id = host.id();
        let mut rooms = self.inner.rooms.write().await;

        let room_id = loop {
            let candidate = RoomId(rand::rng().random_range(1..=MAX_ROOM_ID));
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let ticket = TeardownTicket::new(room_id);
        let guard = Arc::clone(&ticket.guard);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = spawn_room(
            room_id,
            host,
            &self.inner.config,
            shutdown_rx,
            ticket,
            self.inner.teardown_tx.clone(),
        );

        rooms.insert(
            room_id,
            RoomEntry {
                handle,
                guard,
                shutdown: Some(shutdown_tx),
            },
        );

        tracing::info!(%room_id, host = %host_id, rooms = rooms.len(), "room created");
        room_id
    }

    /// Resolves a room id to a handle for its actor.
    pub async fn lookup(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.inner
            .rooms
            .read()
            .await
            .get(&room_id)
            .map(|entry| entry.handle.clone())
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Removes a room and stops its actor.
    ///
    /// Safe to call any number of times, concurrently, and racing the
    /// room's own empty-room teardown. Returns `true` only for the call
    /// that actually removed the room.
    pub async fn request_teardown(&self, room_id: RoomId) -> bool {
        let mut rooms = self.inner.rooms.write().await;

        let Some(entry) = rooms.get(&room_id) else {
            return false;
        };
        let claimed = !entry.guard.swap(true, Ordering::AcqRel);
        if !claimed {
            // The actor's own teardown won and will remove the entry.
            return false;
        }

        if let Some(mut entry) = rooms.remove(&room_id) {
            if let Some(shutdown) = entry.shutdown.take() {
                let _ = shutdown.send(());
            }
        }
        tracing::info!(%room_id, rooms = rooms.len(), "room torn down");
        true
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.rooms.read().await.len()
    }

    /// Ids of all live rooms, in no particular order.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.inner.rooms.read().await.keys().copied().collect()
    }

    /// Tears down every room.
    pub async fn shutdown(&self) {
        let ids = self.room_ids().await;
        for room_id in ids {
            self.request_teardown(room_id).await;
        }
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Removes rooms whose actors finished on their own.
///
/// Holds only a weak reference so it never keeps the registry alive; it
/// exits once the registry and every actor are gone.
async fn teardown_listener(
    registry: Weak<RegistryInner>,
    mut rx: mpsc::UnboundedReceiver<TeardownTicket>,
) {
    while let Some(ticket) = rx.recv().await {
        let room_id = ticket.room_id;
        if !ticket.claim() {
            tracing::debug!(%room_id, "duplicate teardown ignored");
            continue;
        }
        let Some(inner) = registry.upgrade() else {
            break;
        };

        let mut rooms = inner.rooms.write().await;
        let owned = rooms
            .get(&room_id)
            .is_some_and(|entry| ticket.is_same_room(&entry.guard));
        if owned {
            rooms.remove(&room_id);
            tracing::info!(%room_id, rooms = rooms.len(), "room torn down");
        }
    }
    tracing::debug!("teardown listener stopped");
}
