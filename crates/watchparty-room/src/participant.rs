//! Participants and their outbound queues.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use watchparty_protocol::{Message, ParticipantId, RoomId, Sender};

/// Counter for generating participant ids.
static NEXT_PARTICIPANT_ID: AtomicU64 = AtomicU64::new(1);

/// Write side of a participant's outbound queue.
pub type OutboundSender = mpsc::Sender<Message>;

/// Read side of a participant's outbound queue, drained by the connection
/// adapter's delivery task.
pub type OutboundReceiver = mpsc::Receiver<Message>;

/// A member of a room, as the room actor sees it.
///
/// The participant is moved into the room with its `Join` command, taking
/// the only write end of its outbound queue with it. When the room drops
/// the participant (on `Leave` or teardown), the queue closes and the
/// delivery task draining it finishes.
#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    name: String,
    outbound: OutboundSender,
}

impl Participant {
    /// Wraps an existing outbound queue.
    pub fn new(id: ParticipantId, name: impl Into<String>, outbound: OutboundSender) -> Self {
        Self {
            id,
            name: name.into(),
            outbound,
        }
    }

    /// Creates a participant together with a fresh bounded outbound queue.
    pub fn with_queue(
        id: ParticipantId,
        name: impl Into<String>,
        capacity: usize,
    ) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, name, tx), rx)
    }

    /// Allocates a process-wide unique participant id.
    pub fn next_id() -> ParticipantId {
        ParticipantId(NEXT_PARTICIPANT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity stamped onto messages this participant sends.
    pub fn sender(&self) -> Sender {
        Sender {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Best-effort delivery: never waits.
    ///
    /// Returns `false` if the message was dropped because the queue is
    /// full or already closed.
    pub(crate) fn deliver(&self, room_id: RoomId, msg: Message) -> bool {
        match self.outbound.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                tracing::warn!(
                    %room_id,
                    participant_id = %self.id,
                    name = %self.name,
                    kind = %msg.kind,
                    "outbound queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(msg)) => {
                tracing::debug!(
                    %room_id,
                    participant_id = %self.id,
                    kind = %msg.kind,
                    "outbound queue closed, dropping message"
                );
                false
            }
        }
    }
}
