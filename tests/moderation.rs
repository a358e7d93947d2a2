//! Moderation flows end to end: authorization, sanctions, audit, and the
//! visible effects on live sessions.

mod common;

use common::Harness;
use roomchat::application::{
    ChatError, ModerationError, ModerationRequest, OutboundEvent, SessionControl,
};
use roomchat::domain::entities::{ModerationKind, Role, SanctionStatus, Scope, Visibility};
use roomchat::domain::services::DenyReason;

fn request(kind: ModerationKind, target_id: i64, room_id: Option<i64>) -> ModerationRequest {
    ModerationRequest {
        kind,
        target_id: Some(target_id),
        message_id: None,
        room_id,
        reason: "test".into(),
        duration_secs: None,
    }
}

#[tokio::test]
async fn global_ban_closes_sessions_and_blocks_reconnect() {
    let harness = Harness::with_default_room();
    let mut target = harness.connect("target", 2).await;
    target.drain();

    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Ban, 2, None))
        .await
        .expect("ban should succeed");

    // The target gets a final error frame and a force-close signal
    let mut saw_error = false;
    while let Ok(event) = target.events.try_recv() {
        if let OutboundEvent::Error { code, .. } = event {
            assert_eq!(code, "banned");
            saw_error = true;
        }
    }
    assert!(saw_error);
    assert!(matches!(
        target.take_force_close(),
        Some(SessionControl::ForceClose { .. })
    ));

    // The handshake check denies a reconnect attempt
    assert_eq!(harness.filter.check_connect(2), Err(DenyReason::Banned));
}

#[tokio::test]
async fn room_ban_removes_subscription_but_keeps_session() {
    let harness = Harness::with_default_room();
    let mut target = harness.connect("target", 2).await;
    target.drain();

    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Ban, 2, Some(10)))
        .await
        .expect("room ban should succeed");

    assert!(!harness.presence.is_subscribed("target", 10));
    assert!(harness.presence.is_online(2));
    assert!(target.take_force_close().is_none());
    assert_eq!(
        harness.sanctions.status_for(2, Scope::Room(10)),
        SanctionStatus::Banned
    );
    assert_eq!(harness.sanctions.status_for(2, Scope::Global), SanctionStatus::None);
}

#[tokio::test]
async fn room_moderator_cannot_issue_global_sanctions() {
    let harness = Harness::with_default_room();
    harness.directory.promote_moderator(10, 3);

    let result = harness
        .moderation
        .execute(3, Role::Member, request(ModerationKind::Ban, 2, None))
        .await;
    assert!(matches!(result, Err(ModerationError::AuthorizationDenied)));
    assert_eq!(harness.sanctions.status_for(2, Scope::Global), SanctionStatus::None);
}

#[tokio::test]
async fn promoted_moderator_can_moderate_their_room() {
    let harness = Harness::with_default_room();
    harness.directory.promote_moderator(10, 3);

    harness
        .moderation
        .execute(3, Role::Member, request(ModerationKind::Mute, 2, Some(10)))
        .await
        .expect("room mute should succeed");
    assert_eq!(
        harness.sanctions.status_for(2, Scope::Room(10)),
        SanctionStatus::Muted
    );
}

#[tokio::test]
async fn plain_member_cannot_moderate() {
    let harness = Harness::with_default_room();
    let result = harness
        .moderation
        .execute(2, Role::Member, request(ModerationKind::Mute, 3, Some(10)))
        .await;
    assert!(matches!(result, Err(ModerationError::AuthorizationDenied)));
}

#[tokio::test]
async fn target_outranking_actor_is_rejected() {
    let harness = Harness::with_default_room();
    harness.identity.add_user(4, "root", Role::Superuser, "token-root");

    let result = harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Ban, 4, None))
        .await;
    assert!(matches!(result, Err(ModerationError::InvalidTarget)));
}

#[tokio::test]
async fn self_sanction_is_rejected() {
    let harness = Harness::with_default_room();
    let result = harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Mute, 1, None))
        .await;
    assert!(matches!(result, Err(ModerationError::InvalidTarget)));
}

#[tokio::test]
async fn mute_blocks_send_until_unmute() {
    let harness = Harness::with_default_room();
    let session = harness.connect("s", 2).await;

    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Mute, 2, Some(10)))
        .await
        .expect("mute should succeed");

    let denied = harness
        .chat
        .send(&session.session_id, 2, 10, "hi".into(), None)
        .await;
    assert!(matches!(denied, Err(ChatError::Denied(DenyReason::Muted))));

    // Typing is still permitted while muted
    harness
        .chat
        .typing(&session.session_id, 2, 10, true)
        .await
        .expect("typing should pass while muted");

    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Unmute, 2, Some(10)))
        .await
        .expect("unmute should succeed");

    harness
        .chat
        .send(&session.session_id, 2, 10, "hi again".into(), None)
        .await
        .expect("send should pass after unmute");
}

#[tokio::test]
async fn unmute_without_active_sanction_is_invalid() {
    let harness = Harness::with_default_room();
    let result = harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Unmute, 2, Some(10)))
        .await;
    assert!(matches!(result, Err(ModerationError::InvalidTarget)));
}

#[tokio::test]
async fn kick_disconnects_and_blocks_rejoin() {
    let harness = Harness::with_default_room();
    let mut target = harness.connect("target", 2).await;
    target.drain();

    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Kick, 2, Some(10)))
        .await
        .expect("kick should succeed");

    assert!(matches!(
        target.take_force_close(),
        Some(SessionControl::ForceClose { .. })
    ));
    assert!(harness.sanctions.is_rejoin_blocked(2, 10));

    // Re-joining the room is denied during the cool-down
    let rejoin = harness.chat.join("target-2", 2, 10).await;
    assert!(matches!(rejoin, Err(ChatError::Denied(DenyReason::Kicked))));

    // Other rooms and plain sends stay unaffected
    assert_eq!(harness.sanctions.status_for(2, Scope::Room(10)), SanctionStatus::None);
}

#[tokio::test]
async fn audit_failure_aborts_the_whole_action() {
    let harness = Harness::with_default_room();
    let mut observer = harness.connect("observer", 3).await;
    observer.drain();
    harness.sink.set_fail_audit(true);

    let result = harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Ban, 2, Some(10)))
        .await;

    assert!(matches!(result, Err(ModerationError::Persistence(_))));
    // No sanction, no broadcast, nothing observable
    assert_eq!(harness.sanctions.status_for(2, Scope::Room(10)), SanctionStatus::None);
    assert!(harness.sink.sanctions.lock().is_empty());
    observer.assert_no_event();
}

#[tokio::test]
async fn audit_entry_recorded_per_accepted_action() {
    let harness = Harness::with_default_room();
    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Mute, 2, Some(10)))
        .await
        .expect("mute should succeed");
    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Unmute, 2, Some(10)))
        .await
        .expect("unmute should succeed");

    let entries = harness.sink.audit_entries.lock();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, ModerationKind::Mute);
    assert_eq!(entries[0].target_id, Some(2));
    assert_eq!(entries[1].kind, ModerationKind::Unmute);
}

#[tokio::test]
async fn moderation_broadcast_reaches_room_members() {
    let harness = Harness::with_default_room();
    let mut observer = harness.connect("observer", 3).await;
    observer.drain();

    harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Mute, 2, Some(10)))
        .await
        .expect("mute should succeed");

    match observer.next_event().await {
        OutboundEvent::Moderation {
            room_id,
            kind,
            target_id,
            actor_id,
            ..
        } => {
            assert_eq!(room_id, Some(10));
            assert_eq!(kind, ModerationKind::Mute);
            assert_eq!(target_id, 2);
            assert_eq!(actor_id, 1);
        }
        other => panic!("expected moderation event, got {:?}", other),
    }
}

#[tokio::test]
async fn expired_sanction_stops_enforcing() {
    let harness = Harness::with_default_room();
    let session = harness.connect("s", 2).await;

    harness
        .moderation
        .execute(
            1,
            Role::Staff,
            ModerationRequest {
                duration_secs: Some(0),
                ..request(ModerationKind::Mute, 2, Some(10))
            },
        )
        .await
        .expect("mute should succeed");

    // Zero-duration sanction has already lapsed at the next query
    harness
        .chat
        .send(&session.session_id, 2, 10, "hi".into(), None)
        .await
        .expect("expired mute should not deny");
}

#[tokio::test]
async fn moderating_unknown_room_reports_room_not_found() {
    let harness = Harness::with_default_room();
    let result = harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::Mute, 2, Some(404)))
        .await;
    assert!(matches!(result, Err(ModerationError::RoomNotFound)));
}

#[tokio::test]
async fn delete_scoped_to_another_room_is_rejected() {
    let harness = Harness::with_default_room();
    harness.directory.add_room(11, "annex", Visibility::Public, 3);
    let sender = harness.connect("sender", 2).await;

    let outcome = harness
        .chat
        .send(&sender.session_id, 2, 10, "stays put".into(), None)
        .await
        .expect("send should succeed");

    // User 3 moderates room 11 as its creator, but the message lives in
    // room 10; the authorized scope must not reach it
    let result = harness
        .moderation
        .execute(
            3,
            Role::Member,
            ModerationRequest {
                kind: ModerationKind::DeleteMessage,
                target_id: Some(2),
                message_id: Some(outcome.message.id),
                room_id: Some(11),
                reason: "test".into(),
                duration_secs: None,
            },
        )
        .await;

    assert!(matches!(result, Err(ModerationError::InvalidTarget)));
    assert!(harness.sink.deletions.lock().is_empty());
    let stored = harness.sink.messages.lock();
    assert!(!stored[0].deleted);
    assert_eq!(stored[0].body, "stays put");
}

#[tokio::test]
async fn delete_message_requires_message_id() {
    let harness = Harness::with_default_room();
    let result = harness
        .moderation
        .execute(1, Role::Staff, request(ModerationKind::DeleteMessage, 2, Some(10)))
        .await;
    assert!(matches!(result, Err(ModerationError::MissingField("message_id"))));
}
