//! Integration tests for rooms driven through the registry.

use std::time::Duration;

use serde_json::json;
use watchparty_protocol::{Message, MessageKind, ParticipantId, RoomId};
use watchparty_room::{
    OutboundReceiver, Participant, RoomConfig, RoomError, RoomHandle, RoomRegistry,
};

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u64) -> ParticipantId {
    ParticipantId(id)
}

fn participant(id: u64, name: &str) -> (Participant, OutboundReceiver) {
    Participant::with_queue(pid(id), name, 16)
}

fn msg(kind: MessageKind, data: serde_json::Value, room_id: RoomId) -> Message {
    Message::new(kind, data, room_id)
}

/// Creates a room hosted by Alice (id 1) and joins Bob (id 2).
async fn alice_and_bob(
    registry: &RoomRegistry,
) -> (RoomHandle, OutboundReceiver, OutboundReceiver) {
    let (alice, alice_rx) = participant(1, "Alice");
    let (bob, bob_rx) = participant(2, "Bob");
    let room_id = registry.create_room(alice).await;
    let handle = registry.lookup(room_id).await.unwrap();
    handle.join(bob).await.unwrap();
    (handle, alice_rx, bob_rx)
}

/// Waits until `room_id` is no longer registered.
async fn wait_until_gone(registry: &RoomRegistry, room_id: RoomId) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while registry.lookup(room_id).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("room was not torn down");
}

// =========================================================================
// Membership
// =========================================================================

#[tokio::test]
async fn test_create_room_makes_creator_host_and_sole_member() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, _rx) = participant(1, "Alice");
    let room_id = registry.create_room(alice).await;

    let info = registry.lookup(room_id).await.unwrap().info().await.unwrap();
    assert_eq!(info.room_id, room_id);
    assert_eq!(info.host, Some(pid(1)));
    assert_eq!(info.members, vec![pid(1)]);
}

#[tokio::test]
async fn test_membership_follows_join_and_leave_sequence() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, _a, _b) = alice_and_bob(&registry).await;
    let (carol, _c) = participant(3, "Carol");
    let (dave, _d) = participant(4, "Dave");

    handle.join(carol).await.unwrap();
    handle.join(dave).await.unwrap();
    handle.leave(pid(3)).await.unwrap();

    let info = handle.info().await.unwrap();
    assert_eq!(info.members, vec![pid(1), pid(2), pid(4)]);
    assert_eq!(info.host, Some(pid(1)));
}

#[tokio::test]
async fn test_leave_from_non_member_is_ignored() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, _a, _b) = alice_and_bob(&registry).await;

    handle.leave(pid(99)).await.unwrap();

    let info = handle.info().await.unwrap();
    assert_eq!(info.members, vec![pid(1), pid(2)]);
}

#[tokio::test]
async fn test_rejoin_with_same_id_keeps_single_membership() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, _a, mut old_bob_rx) = alice_and_bob(&registry).await;

    let (bob_again, mut new_bob_rx) = participant(2, "Bob");
    handle.join(bob_again).await.unwrap();
    let info = handle.info().await.unwrap();
    assert_eq!(info.members, vec![pid(1), pid(2)]);

    // The old queue was replaced and closed; new traffic goes to the new one.
    assert!(old_bob_rx.recv().await.is_none());
    let chat = msg(MessageKind::Chat, json!({ "text": "hey" }), info.room_id);
    handle.broadcast(pid(1), chat).await.unwrap();
    assert_eq!(new_bob_rx.recv().await.unwrap().kind, MessageKind::Chat);
}

// =========================================================================
// Host migration and teardown
// =========================================================================

#[tokio::test]
async fn test_host_leave_promotes_earliest_joiner() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, _a, mut bob_rx) = alice_and_bob(&registry).await;
    let (carol, mut carol_rx) = participant(3, "Carol");
    handle.join(carol).await.unwrap();

    handle.leave(pid(1)).await.unwrap();
    let info = handle.info().await.unwrap();
    assert_eq!(info.host, Some(pid(2)));

    // Exactly one host-changed message per remaining member.
    for rx in [&mut bob_rx, &mut carol_rx] {
        let changed = rx.recv().await.unwrap();
        assert_eq!(changed.kind, MessageKind::HostChanged);
        assert_eq!(changed.data["host_id"], 2);
        assert_eq!(changed.data["host_name"], "Bob");
        assert_eq!(changed.data["room_id"], info.room_id.0);
        assert!(changed.sender.is_none());
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn test_non_host_leave_sends_no_host_change() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, mut alice_rx, _b) = alice_and_bob(&registry).await;

    handle.leave(pid(2)).await.unwrap();
    let info = handle.info().await.unwrap();
    assert_eq!(info.host, Some(pid(1)));
    assert!(alice_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_alice_bob_scenario() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, _alice_rx) = participant(1, "Alice");
    let room_id = registry.create_room(alice).await;
    let handle = registry.lookup(room_id).await.unwrap();

    let (bob, mut bob_rx) = participant(2, "Bob");
    handle.join(bob).await.unwrap();
    let info = handle.info().await.unwrap();
    assert_eq!(info.members, vec![pid(1), pid(2)]);
    assert_eq!(info.host, Some(pid(1)));

    handle.leave(pid(1)).await.unwrap();
    let changed = bob_rx.recv().await.unwrap();
    assert_eq!(changed.kind, MessageKind::HostChanged);
    assert_eq!(changed.data["host_name"], "Bob");
    assert_eq!(handle.info().await.unwrap().host, Some(pid(2)));

    handle.leave(pid(2)).await.unwrap();
    wait_until_gone(&registry, room_id).await;
    assert!(matches!(
        registry.lookup(room_id).await,
        Err(RoomError::NotFound(id)) if id == room_id
    ));
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn test_handle_fails_after_room_empties() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, _rx) = participant(1, "Alice");
    let room_id = registry.create_room(alice).await;
    let handle = registry.lookup(room_id).await.unwrap();

    handle.leave(pid(1)).await.unwrap();
    wait_until_gone(&registry, room_id).await;

    let (bob, _b) = participant(2, "Bob");
    assert!(matches!(handle.join(bob).await, Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_handle_fails_after_request_teardown() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, _rx) = participant(1, "Alice");
    let room_id = registry.create_room(alice).await;
    let handle = registry.lookup(room_id).await.unwrap();

    assert!(registry.request_teardown(room_id).await);
    assert!(handle.is_closed());

    let (bob, mut bob_rx) = participant(2, "Bob");
    assert!(matches!(
        handle.join(bob).await,
        Err(RoomError::NotFound(id)) if id == room_id
    ));
    let chat = msg(MessageKind::Chat, json!({ "text": "hi" }), room_id);
    assert!(matches!(
        handle.broadcast(pid(1), chat).await,
        Err(RoomError::NotFound(_))
    ));
    assert!(handle.info().await.is_err());
    assert!(bob_rx.recv().await.is_none());
}

#[tokio::test]
async fn test_dropping_registry_closes_every_room() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, mut alice_rx) = participant(1, "Alice");
    let (bob, mut bob_rx) = participant(2, "Bob");
    let first = registry.create_room(alice).await;
    let second = registry.create_room(bob).await;
    let first_handle = registry.lookup(first).await.unwrap();
    let second_handle = registry.lookup(second).await.unwrap();

    let clone = registry.clone();
    drop(registry);
    drop(clone);

    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        assert!(alice_rx.recv().await.is_none());
        assert!(bob_rx.recv().await.is_none());
    })
    .await;
    assert!(closed.is_ok(), "room actors outlived the registry");

    assert!(first_handle.info().await.is_err());
    assert!(second_handle.info().await.is_err());
}

#[tokio::test]
async fn test_concurrent_teardown_requests_remove_room_once() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, mut alice_rx) = participant(1, "Alice");
    let room_id = registry.create_room(alice).await;

    let (first, second) = tokio::join!(
        registry.request_teardown(room_id),
        registry.request_teardown(room_id)
    );
    assert!(first ^ second);
    assert!(!registry.request_teardown(room_id).await);

    // Stopping the actor drops Alice's queue.
    assert!(alice_rx.recv().await.is_none());
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn test_teardown_racing_empty_room_removes_once() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, _rx) = participant(1, "Alice");
    let room_id = registry.create_room(alice).await;
    let handle = registry.lookup(room_id).await.unwrap();

    handle.leave(pid(1)).await.unwrap();
    let _ = registry.request_teardown(room_id).await;
    wait_until_gone(&registry, room_id).await;

    // The registry is still usable afterwards.
    let (bob, _b) = participant(2, "Bob");
    let other = registry.create_room(bob).await;
    assert_ne!(other, room_id);
    assert_eq!(registry.room_count().await, 1);
}

// =========================================================================
// Chat and playback routing
// =========================================================================

#[tokio::test]
async fn test_chat_reaches_everyone_including_sender() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, mut alice_rx, mut bob_rx) = alice_and_bob(&registry).await;

    let chat = msg(MessageKind::Chat, json!({ "text": "hi" }), handle.room_id());
    handle.submit(pid(2), chat).await.unwrap();

    assert_eq!(alice_rx.recv().await.unwrap().data["text"], "hi");
    assert_eq!(bob_rx.recv().await.unwrap().data["text"], "hi");
}

#[tokio::test]
async fn test_host_seek_reaches_everyone_but_host() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, mut alice_rx, mut bob_rx) = alice_and_bob(&registry).await;

    let seek = msg(MessageKind::VideoSeek, json!({ "position": 42.5 }), handle.room_id());
    handle.submit(pid(1), seek).await.unwrap();
    let info = handle.info().await.unwrap();

    assert_eq!(bob_rx.recv().await.unwrap().kind, MessageKind::VideoSeek);
    assert!(alice_rx.try_recv().is_err());
    assert_eq!(info.position, 42.5);
}

#[tokio::test]
async fn test_non_host_playback_command_reaches_no_one() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, mut alice_rx, mut bob_rx) = alice_and_bob(&registry).await;

    for (kind, data) in [
        (MessageKind::VideoSeek, json!({ "position": 10 })),
        (MessageKind::PlayPause, json!({ "is_playing": true })),
        (MessageKind::VideoUrlChanged, json!({ "url": "https://v/1" })),
    ] {
        handle
            .submit(pid(2), msg(kind, data, handle.room_id()))
            .await
            .unwrap();
    }
    let info = handle.info().await.unwrap();

    assert!(alice_rx.try_recv().is_err());
    assert!(bob_rx.try_recv().is_err());
    assert_eq!(info.video_url, "");
    assert!(!info.is_playing);
    assert_eq!(info.position, 0.0);
}

#[tokio::test]
async fn test_broadcast_from_non_member_is_ignored() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, mut alice_rx, mut bob_rx) = alice_and_bob(&registry).await;

    let chat = msg(MessageKind::Chat, json!({ "text": "spam" }), handle.room_id());
    handle.submit(pid(50), chat).await.unwrap();
    handle.info().await.unwrap();

    assert!(alice_rx.try_recv().is_err());
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_playback_state_tracks_host_commands() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, _a, _b) = alice_and_bob(&registry).await;
    let room_id = handle.room_id();

    handle
        .submit(pid(1), msg(MessageKind::VideoUrlChanged, json!({ "url": "https://v/9" }), room_id))
        .await
        .unwrap();
    handle
        .submit(pid(1), msg(MessageKind::VideoSeek, json!({ "position": 30 }), room_id))
        .await
        .unwrap();
    handle
        .submit(pid(1), msg(MessageKind::PlayPause, json!({ "is_playing": true }), room_id))
        .await
        .unwrap();

    let info = handle.info().await.unwrap();
    assert_eq!(info.video_url, "https://v/9");
    assert!(info.is_playing);
    assert!(info.position >= 30.0);
}

#[tokio::test]
async fn test_full_outbound_queue_drops_without_failing() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (alice, _alice_rx) = participant(1, "Alice");
    let (bob, mut bob_rx) = Participant::with_queue(pid(2), "Bob", 1);
    let room_id = registry.create_room(alice).await;
    let handle = registry.lookup(room_id).await.unwrap();
    handle.join(bob).await.unwrap();

    // Fill Bob's single slot, then seek while it is still full.
    let chat = msg(MessageKind::Chat, json!({ "text": "first" }), room_id);
    handle.broadcast(pid(1), chat).await.unwrap();
    let seek = msg(MessageKind::VideoSeek, json!({ "position": 5 }), room_id);
    assert!(handle.broadcast(pid(1), seek).await.is_ok());

    let info = handle.info().await.unwrap();
    assert_eq!(info.members, vec![pid(1), pid(2)]);
    assert_eq!(info.position, 5.0);

    assert_eq!(bob_rx.recv().await.unwrap().data["text"], "first");
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_late_joiner_receives_chat_history() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, _a, _b) = alice_and_bob(&registry).await;

    for text in ["one", "two"] {
        let chat = msg(MessageKind::Chat, json!({ "text": text }), handle.room_id());
        handle.broadcast(pid(2), chat).await.unwrap();
    }

    let (carol, mut carol_rx) = participant(3, "Carol");
    handle.join(carol).await.unwrap();

    assert_eq!(carol_rx.recv().await.unwrap().data["text"], "one");
    assert_eq!(carol_rx.recv().await.unwrap().data["text"], "two");
}

// =========================================================================
// Sync
// =========================================================================

#[tokio::test]
async fn test_member_sync_request_is_forwarded_to_host() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, mut alice_rx, mut bob_rx) = alice_and_bob(&registry).await;

    let request = msg(MessageKind::SyncRequest, json!({}), handle.room_id());
    handle.submit(pid(2), request.clone()).await.unwrap();

    let forwarded = alice_rx.recv().await.unwrap();
    assert_eq!(forwarded, request);
    handle.info().await.unwrap();
    assert!(bob_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_host_sync_request_gets_sync_response() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let (handle, mut alice_rx, _b) = alice_and_bob(&registry).await;
    let room_id = handle.room_id();

    handle
        .submit(pid(1), msg(MessageKind::VideoUrlChanged, json!({ "url": "https://v/3" }), room_id))
        .await
        .unwrap();
    handle
        .sync_request(pid(1), msg(MessageKind::SyncRequest, json!({}), room_id))
        .await
        .unwrap();

    let response = alice_rx.recv().await.unwrap();
    assert_eq!(response.kind, MessageKind::SyncResponse);
    assert_eq!(response.data["host_id"], 1);
    assert_eq!(response.data["host_name"], "Alice");
    assert_eq!(response.data["video_url"], "https://v/3");
    assert_eq!(response.data["is_playing"], false);
    assert_eq!(response.data["current_time"], 0.0);
}
