//! Room actor: an isolated Tokio task that owns one room's state.
//!
//! Every change to a room (membership, host, playback, history) happens
//! inside its actor, one command at a time, in queue order. Nothing else
//! reads or writes those fields, so host migration and membership changes
//! need no locking.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use watchparty_protocol::{Message, MessageKind, ParticipantId, RoomId};

use crate::{Participant, PlaybackState, RoomConfig, RoomError};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands accepted by a room actor through its inbound queue.
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a participant to the room.
    Join { participant: Participant },

    /// Remove a participant. May migrate the host or finish the room.
    Leave { participant_id: ParticipantId },

    /// A participant asks for the current playback state.
    SyncRequest {
        participant_id: ParticipantId,
        message: Message,
    },

    /// A participant sends chat or a playback-control message.
    Broadcast {
        participant_id: ParticipantId,
        message: Message,
    },

    /// Request a snapshot of the room.
    Info { reply: oneshot::Sender<RoomInfo> },
}

impl RoomCommand {
    /// Wraps a client message in the command its kind calls for:
    /// sync requests become `SyncRequest`, everything else `Broadcast`.
    pub fn from_message(participant_id: ParticipantId, message: Message) -> Self {
        if message.kind == MessageKind::SyncRequest {
            Self::SyncRequest {
                participant_id,
                message,
            }
        } else {
            Self::Broadcast {
                participant_id,
                message,
            }
        }
    }
}

/// A snapshot of a room's state.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub host: Option<ParticipantId>,
    /// Members in join order.
    pub members: Vec<ParticipantId>,
    pub video_url: String,
    pub is_playing: bool,
    /// Playback position in seconds at the time of the snapshot.
    pub position: f64,
    /// Number of chat messages held for replay.
    pub history_len: usize,
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor.
///
/// Cheap to clone: an `mpsc::Sender`, the room id, and the room's teardown
/// guard. Every method fails with [`RoomError::NotFound`] once the room has
/// been torn down or its actor has stopped.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
    torn_down: Arc<AtomicBool>,
}

impl RoomHandle {
    /// The id of the room this handle points at.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Enqueues a raw command. Waits if the inbound queue is full.
    pub async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        if self.torn_down.load(Ordering::Acquire) {
            return Err(RoomError::NotFound(self.room_id));
        }
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::NotFound(self.room_id))
    }

    /// Adds a participant to the room.
    pub async fn join(&self, participant: Participant) -> Result<(), RoomError> {
        self.send(RoomCommand::Join { participant }).await
    }

    /// Removes a participant from the room.
    pub async fn leave(&self, participant_id: ParticipantId) -> Result<(), RoomError> {
        self.send(RoomCommand::Leave { participant_id }).await
    }

    /// Submits a sync request from a participant.
    pub async fn sync_request(
        &self,
        participant_id: ParticipantId,
        message: Message,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::SyncRequest {
            participant_id,
            message,
        })
        .await
    }

    /// Submits a chat or playback-control message from a participant.
    pub async fn broadcast(
        &self,
        participant_id: ParticipantId,
        message: Message,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Broadcast {
            participant_id,
            message,
        })
        .await
    }

    /// Routes a client message by its kind (see [`RoomCommand::from_message`]).
    pub async fn submit(
        &self,
        participant_id: ParticipantId,
        message: Message,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::from_message(participant_id, message))
            .await
    }

    /// Asks the actor for a snapshot. Answered in queue order, so the
    /// snapshot reflects every command submitted before it.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Info { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| RoomError::NotFound(self.room_id))
    }

    /// Returns `true` once the room is torn down or its actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.torn_down.load(Ordering::Acquire) || self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

/// One-shot teardown token for a single room instance.
///
/// The actor and the registry entry share the guard. Whoever flips it
/// first performs the teardown; every later attempt is a no-op.
#[derive(Debug, Clone)]
pub(crate) struct TeardownTicket {
    pub(crate) room_id: RoomId,
    pub(crate) guard: Arc<AtomicBool>,
}

impl TeardownTicket {
    pub(crate) fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            guard: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` exactly once across all clones.
    pub(crate) fn claim(&self) -> bool {
        !self.guard.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_same_room(&self, guard: &Arc<AtomicBool>) -> bool {
        Arc::ptr_eq(&self.guard, guard)
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

struct Member {
    participant: Participant,
    /// Join order; the lowest remaining value is promoted when the host leaves.
    seq: u64,
}

enum Flow {
    Continue,
    Finished,
}

struct RoomActor {
    room_id: RoomId,
    host: Option<ParticipantId>,
    members: HashMap<ParticipantId, Member>,
    next_seq: u64,
    playback: PlaybackState,
    history: VecDeque<Message>,
    history_limit: usize,
    receiver: mpsc::Receiver<RoomCommand>,
    shutdown: oneshot::Receiver<()>,
    ticket: TeardownTicket,
    teardown_tx: mpsc::UnboundedSender<TeardownTicket>,
}

impl RoomActor {
    /// Processes commands until the room empties or the registry closes it.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, host = ?self.host, "room actor started");

        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown => {
                    tracing::info!(room_id = %self.room_id, "room closed by registry");
                    break;
                }
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Flow::Finished = self.handle(cmd) {
                        tracing::info!(room_id = %self.room_id, "room empty, requesting teardown");
                        // Handles must fail before the registry forgets the room.
                        self.receiver.close();
                        let _ = self.teardown_tx.send(self.ticket.clone());
                        break;
                    }
                }
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join { participant } => {
                self.handle_join(participant);
                Flow::Continue
            }
            RoomCommand::Leave { participant_id } => self.handle_leave(participant_id),
            RoomCommand::SyncRequest {
                participant_id,
                message,
            } => {
                self.handle_sync_request(participant_id, message);
                Flow::Continue
            }
            RoomCommand::Broadcast {
                participant_id,
                message,
            } => {
                self.handle_broadcast(participant_id, message);
                Flow::Continue
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
                Flow::Continue
            }
        }
    }

    fn handle_join(&mut self, participant: Participant) {
        let participant_id = participant.id();

        // Replay history before anything else lands on the new queue.
        for msg in &self.history {
            participant.deliver(self.room_id, msg.clone());
        }

        tracing::info!(
            room_id = %self.room_id,
            %participant_id,
            name = participant.name(),
            "participant joined"
        );

        match self.members.get_mut(&participant_id) {
            // Rejoin with the same id: swap the queue, keep join order.
            Some(member) => member.participant = participant,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.members
                    .insert(participant_id, Member { participant, seq });
            }
        }
    }

    fn handle_leave(&mut self, participant_id: ParticipantId) -> Flow {
        let Some(member) = self.members.remove(&participant_id) else {
            tracing::debug!(
                room_id = %self.room_id,
                %participant_id,
                "leave from non-member, ignoring"
            );
            return Flow::Continue;
        };

        tracing::info!(
            room_id = %self.room_id,
            %participant_id,
            name = member.participant.name(),
            members = self.members.len(),
            "participant left"
        );
        // Dropping the member closes its outbound queue.
        drop(member);

        if self.host != Some(participant_id) {
            if self.members.is_empty() && self.host.is_none() {
                return Flow::Finished;
            }
            return Flow::Continue;
        }

        let Some(new_host) = self.members.values().min_by_key(|m| m.seq) else {
            self.host = None;
            return Flow::Finished;
        };
        let new_host_id = new_host.participant.id();
        let new_host_name = new_host.participant.name().to_string();
        self.host = Some(new_host_id);

        tracing::info!(
            room_id = %self.room_id,
            host = %new_host_id,
            name = %new_host_name,
            "host migrated"
        );

        let msg = Message::new(
            MessageKind::HostChanged,
            json!({
                "room_id": self.room_id,
                "host_id": new_host_id,
                "host_name": new_host_name,
            }),
            self.room_id,
        );
        for member in self.members.values() {
            member.participant.deliver(self.room_id, msg.clone());
        }

        Flow::Continue
    }

    fn handle_sync_request(&mut self, participant_id: ParticipantId, message: Message) {
        if !self.members.contains_key(&participant_id) {
            tracing::debug!(
                room_id = %self.room_id,
                %participant_id,
                "sync request from non-member, ignoring"
            );
            return;
        }
        let Some(host) = self.host.and_then(|id| self.members.get(&id)) else {
            tracing::debug!(room_id = %self.room_id, "sync request with no host");
            return;
        };

        if host.participant.id() == participant_id {
            let response = Message::new(
                MessageKind::SyncResponse,
                json!({
                    "room_id": self.room_id,
                    "host_id": host.participant.id(),
                    "host_name": host.participant.name(),
                    "video_url": self.playback.video_url(),
                    "current_time": self.playback.position(),
                    "is_playing": self.playback.is_playing(),
                }),
                self.room_id,
            );
            host.participant.deliver(self.room_id, response);
        } else {
            tracing::debug!(
                room_id = %self.room_id,
                %participant_id,
                host = %host.participant.id(),
                "forwarding sync request to host"
            );
            host.participant.deliver(self.room_id, message);
        }
    }

    fn handle_broadcast(&mut self, participant_id: ParticipantId, message: Message) {
        if !self.members.contains_key(&participant_id) {
            tracing::debug!(
                room_id = %self.room_id,
                %participant_id,
                "broadcast from non-member, ignoring"
            );
            return;
        }

        let is_chat = message.kind == MessageKind::Chat;
        if !is_chat && self.host != Some(participant_id) {
            tracing::debug!(
                room_id = %self.room_id,
                %participant_id,
                kind = %message.kind,
                "non-host playback command dropped"
            );
            return;
        }

        if message.kind.requires_host() {
            self.playback
                .apply(message.kind, &message.data, Instant::now());
        }

        for (id, member) in &self.members {
            if is_chat || *id != participant_id {
                member.participant.deliver(self.room_id, message.clone());
            }
        }

        if is_chat && self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(message);
        }
    }

    fn info(&self) -> RoomInfo {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.seq);
        RoomInfo {
            room_id: self.room_id,
            host: self.host,
            members: members.iter().map(|m| m.participant.id()).collect(),
            video_url: self.playback.video_url().to_string(),
            is_playing: self.playback.is_playing(),
            position: self.playback.position(),
            history_len: self.history.len(),
        }
    }
}

/// Spawns a room actor with `host` as its host and sole member.
///
/// The actor stops when `shutdown` fires (or its sender is dropped), or
/// on its own once the room empties, in which case it sends `ticket` on
/// `teardown_tx` first.
pub(crate) fn spawn_room(
    room_id: RoomId,
    host: Participant,
    config: &RoomConfig,
    shutdown: oneshot::Receiver<()>,
    ticket: TeardownTicket,
    teardown_tx: mpsc::UnboundedSender<TeardownTicket>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_queue_capacity.max(1));

    let torn_down = Arc::clone(&ticket.guard);
    let host_id = host.id();
    let mut members = HashMap::new();
    members.insert(
        host_id,
        Member {
            participant: host,
            seq: 0,
        },
    );

    let actor = RoomActor {
        room_id,
        host: Some(host_id),
        members,
        next_seq: 1,
        playback: PlaybackState::new(),
        history: VecDeque::with_capacity(config.history_limit.min(64)),
        history_limit: config.history_limit,
        receiver: rx,
        shutdown,
        ticket,
        teardown_tx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
        torn_down,
    }
}
