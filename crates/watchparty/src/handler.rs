//! Per-connection handler: hello, admission, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `ClientHello` → create or join a room
//!   2. Send `ServerHello` → participant is admitted
//!   3. Spawn the delivery task draining the participant's outbound queue
//!   4. Loop: receive `ClientMessage`s → validate, stamp, submit to the room
//!   5. On close, leave the room

use std::sync::Arc;

use watchparty_protocol::{
    ClientHello, ClientMessage, Codec, JsonCodec, ParticipantId, Sender, ServerHello, now_millis,
};
use watchparty_room::{OutboundReceiver, Participant, RoomHandle};
use watchparty_transport::{Connection, WebSocketConnection};

use crate::WatchPartyError;
use crate::server::ServerState;

/// Drop guard that removes the participant from its room when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the leave is sent from a spawned task.
struct LeaveGuard {
    handle: RoomHandle,
    participant_id: ParticipantId,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        let handle = self.handle.clone();
        let participant_id = self.participant_id;
        tokio::spawn(async move {
            if handle.leave(participant_id).await.is_err() {
                tracing::debug!(
                    room_id = %handle.room_id(),
                    %participant_id,
                    "room already gone on leave"
                );
            }
        });
    }
}

/// A participant that is now a member of a room, with its reply pending.
struct Admission {
    handle: RoomHandle,
    sender: Sender,
    outbound: OutboundReceiver,
    reply: ServerHello,
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), WatchPartyError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Hello ---
    let Some(hello) = receive_hello(&conn, &state).await? else {
        tracing::debug!(%conn_id, "closed before hello");
        return Ok(());
    };
    let Some(admission) = admit(&conn, &state, hello).await? else {
        return Ok(());
    };

    let Admission {
        handle,
        sender,
        outbound,
        reply,
    } = admission;
    let room_id = handle.room_id();
    let participant_id = sender.id;
    let guard = LeaveGuard {
        handle: handle.clone(),
        participant_id,
    };

    // --- Step 2: Reply ---
    conn.send(&state.codec.encode(&reply)?).await?;
    tracing::info!(%conn_id, %room_id, %participant_id, name = %sender.name, "participant admitted");

    // --- Step 3: Delivery ---
    let delivery = tokio::spawn(deliver_outbound(
        Arc::clone(&conn),
        state.codec,
        outbound,
        participant_id,
    ));

    // --- Step 4: Message loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%room_id, %participant_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%room_id, %participant_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%participant_id, error = %e, "failed to decode message");
                continue;
            }
        };
        if let Err(e) = msg.validate() {
            tracing::debug!(%participant_id, kind = %msg.kind, error = %e, "invalid message");
            continue;
        }

        let message = msg.into_message(sender.clone(), room_id, now_millis());
        if let Err(e) = handle.submit(participant_id, message).await {
            tracing::info!(%participant_id, error = %e, "room gone, closing connection");
            break;
        }
    }

    // --- Step 5: Leave ---
    // The room drops the participant's queue on leave, which ends delivery.
    drop(guard);
    let _ = tokio::time::timeout(state.handshake_timeout, delivery).await;
    let _ = conn.close().await;
    Ok(())
}

/// Waits for the first frame and parses it as a [`ClientHello`].
///
/// Returns `Ok(None)` if the peer closed first. Rejected hellos get an
/// error reply before the error is returned.
async fn receive_hello(
    conn: &WebSocketConnection,
    state: &ServerState,
) -> Result<Option<ClientHello>, WatchPartyError> {
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => return Ok(None),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            reject(conn, state, 408, "handshake timed out").await;
            return Err(WatchPartyError::HandshakeTimeout);
        }
    };

    let hello = state
        .codec
        .decode::<ClientHello>(&data)
        .and_then(|hello| hello.validate().map(|()| hello));
    match hello {
        Ok(hello) => Ok(Some(hello)),
        Err(e) => {
            reject(conn, state, 400, &e.to_string()).await;
            Err(e.into())
        }
    }
}

/// Creates or joins the room the hello asks for.
///
/// Returns `Ok(None)` after rejecting a join to a room that doesn't exist.
async fn admit(
    conn: &WebSocketConnection,
    state: &ServerState,
    hello: ClientHello,
) -> Result<Option<Admission>, WatchPartyError> {
    let registry = &state.registry;
    let participant_id = Participant::next_id();
    let name = hello.name().trim().to_string();
    let (participant, outbound) = Participant::with_queue(
        participant_id,
        name.clone(),
        registry.config().admission_queue_capacity(),
    );
    let sender = participant.sender();

    let (handle, reply) = match hello {
        ClientHello::CreateRoom { .. } => {
            let room_id = registry.create_room(participant).await;
            let handle = registry.lookup(room_id).await?;
            let reply = ServerHello::RoomCreated {
                room_id,
                user_id: participant_id,
                name,
            };
            (handle, reply)
        }
        ClientHello::JoinRoom { room_id, .. } => {
            let joined = match registry.lookup(room_id).await {
                Ok(handle) => handle.join(participant).await.map(|()| handle),
                Err(e) => Err(e),
            };
            match joined {
                Ok(handle) => {
                    let reply = ServerHello::RoomJoined {
                        room_id,
                        user_id: participant_id,
                        name,
                    };
                    (handle, reply)
                }
                Err(e) => {
                    tracing::debug!(%room_id, error = %e, "join rejected");
                    reject(conn, state, 404, &e.to_string()).await;
                    return Ok(None);
                }
            }
        }
    };

    Ok(Some(Admission {
        handle,
        sender,
        outbound,
        reply,
    }))
}

/// Sends an error hello and closes the connection. Failures are ignored:
/// the peer may already be gone.
async fn reject(conn: &WebSocketConnection, state: &ServerState, code: u16, message: &str) {
    let reply = ServerHello::Error {
        code,
        message: message.to_string(),
    };
    if let Ok(bytes) = state.codec.encode(&reply) {
        let _ = conn.send(&bytes).await;
    }
    let _ = conn.close().await;
}

/// Drains a participant's outbound queue into the socket.
///
/// Ends when the room drops the participant or the socket fails.
async fn deliver_outbound(
    conn: Arc<WebSocketConnection>,
    codec: JsonCodec,
    mut outbound: OutboundReceiver,
    participant_id: ParticipantId,
) {
    while let Some(msg) = outbound.recv().await {
        let bytes = match codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%participant_id, kind = %msg.kind, error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%participant_id, error = %e, "delivery failed");
            break;
        }
    }
    tracing::debug!(%participant_id, "delivery task finished");
}
