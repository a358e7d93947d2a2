//! Message ordering properties of the broadcast bus under concurrency.

mod common;

use common::Harness;
use roomchat::application::OutboundEvent;

#[tokio::test]
async fn concurrent_senders_get_gap_free_sequences() {
    let harness = Harness::with_default_room();
    let mut observer = harness.connect("observer", 3).await;

    let mut tasks = Vec::new();
    for i in 0..4 {
        let chat = harness.chat.clone();
        let session = harness.connect(&format!("sender-{}", i), 2).await;
        tasks.push(tokio::spawn(async move {
            for n in 0..5 {
                chat.send(
                    &session.session_id,
                    session.user_id,
                    10,
                    format!("m{}-{}", session.session_id, n),
                    None,
                )
                .await
                .expect("send should succeed");
            }
        }));
    }
    for task in tasks {
        task.await.expect("sender task panicked");
    }

    let mut sequences = Vec::new();
    for _ in 0..20 {
        sequences.push(observer.next_message().await.sequence);
    }

    // Strictly increasing with no gaps, regardless of sender interleaving
    let expected: Vec<u64> = (1..=20).collect();
    assert_eq!(sequences, expected);
}

#[tokio::test]
async fn all_subscribers_observe_the_same_order() {
    let harness = Harness::with_default_room();
    let mut a = harness.connect("a", 2).await;
    let mut b = harness.connect("b", 3).await;
    let sender = harness.connect("s", 2).await;

    for n in 0..10 {
        harness
            .chat
            .send(&sender.session_id, 2, 10, format!("m{}", n), None)
            .await
            .expect("send should succeed");
    }

    let mut order_a = Vec::new();
    let mut order_b = Vec::new();
    for _ in 0..10 {
        order_a.push(a.next_message().await.id);
        order_b.push(b.next_message().await.id);
    }
    assert_eq!(order_a, order_b);
}

#[tokio::test]
async fn rooms_sequence_independently() {
    let harness = Harness::with_default_room();
    harness
        .directory
        .add_room(11, "side", roomchat::domain::entities::Visibility::Public, 1);
    harness.directory.add_member(11, 2);

    let session = harness.connect("s", 2).await;
    let first = harness
        .chat
        .send(&session.session_id, 2, 10, "in general".into(), None)
        .await
        .expect("send should succeed");
    let second = harness
        .chat
        .send(&session.session_id, 2, 11, "in side".into(), None)
        .await
        .expect("send should succeed");

    assert_eq!(first.message.sequence, 1);
    assert_eq!(second.message.sequence, 1);
}

#[tokio::test]
async fn no_delivery_after_unregister() {
    let harness = Harness::with_default_room();
    let mut leaver = harness.connect("leaver", 3).await;
    let sender = harness.connect("sender", 2).await;

    harness.presence.unregister("leaver").await;
    harness
        .chat
        .send(&sender.session_id, 2, 10, "after".into(), None)
        .await
        .expect("send should succeed");

    leaver.assert_no_event();
}

#[tokio::test]
async fn sender_not_subscribed_is_rejected() {
    let harness = Harness::with_default_room();
    let session = harness.connect("s", 2).await;

    let result = harness
        .chat
        .send(&session.session_id, 2, 999, "nowhere".into(), None)
        .await;
    assert!(matches!(
        result,
        Err(roomchat::application::ChatError::RoomNotFound)
    ));
}

#[tokio::test]
async fn deleted_messages_keep_their_sequence() {
    let harness = Harness::with_default_room();
    let mut observer = harness.connect("observer", 3).await;
    let sender = harness.connect("sender", 2).await;

    let outcome = harness
        .chat
        .send(&sender.session_id, 2, 10, "offending".into(), None)
        .await
        .expect("send should succeed");
    let target = observer.next_message().await;
    assert_eq!(target.id, outcome.message.id);

    harness
        .moderation
        .execute(
            1,
            roomchat::domain::entities::Role::Staff,
            roomchat::application::ModerationRequest {
                kind: roomchat::domain::entities::ModerationKind::DeleteMessage,
                target_id: Some(2),
                message_id: Some(target.id),
                room_id: Some(10),
                reason: "rule 1".into(),
                duration_secs: None,
            },
        )
        .await
        .expect("delete should succeed");

    match observer.next_event().await {
        OutboundEvent::MessageDeleted { room_id, message_id } => {
            assert_eq!(room_id, 10);
            assert_eq!(message_id, target.id);
        }
        other => panic!("expected deletion event, got {:?}", other),
    }

    // The durable record keeps its sequence and loses only the body
    {
        let stored = harness.sink.messages.lock();
        let redacted = stored
            .iter()
            .find(|m| m.id == target.id)
            .expect("message should stay stored");
        assert!(redacted.deleted);
        assert_eq!(redacted.body, roomchat::domain::entities::REDACTED_BODY);
        assert_eq!(redacted.sequence, target.sequence);
    }

    // The next accepted message continues the sequence without renumbering
    let next = harness
        .chat
        .send(&sender.session_id, 2, 10, "next".into(), None)
        .await
        .expect("send should succeed");
    assert_eq!(next.message.sequence, target.sequence + 1);
}
