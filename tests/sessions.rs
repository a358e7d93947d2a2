//! Session attach behavior: the initial auto-subscribe set and explicit
//! joins against private rooms.

mod common;

use common::Harness;
use roomchat::application::ChatError;
use roomchat::domain::entities::Visibility;

#[tokio::test]
async fn private_rooms_are_not_auto_subscribed() {
    let harness = Harness::with_default_room();
    harness
        .directory
        .add_room(20, "backroom", Visibility::Private, 1);
    harness.directory.add_member(20, 2);

    let session = harness.connect("s", 2).await;

    assert_eq!(session.rooms, vec![10]);
    assert!(harness.presence.is_subscribed("s", 10));
    assert!(!harness.presence.is_subscribed("s", 20));
}

#[tokio::test]
async fn private_room_member_can_join_explicitly() {
    let harness = Harness::with_default_room();
    harness
        .directory
        .add_room(20, "backroom", Visibility::Private, 1);
    harness.directory.add_member(20, 2);

    let session = harness.connect("s", 2).await;
    let room = harness
        .chat
        .join(&session.session_id, 2, 20)
        .await
        .expect("member should join a private room explicitly");

    assert_eq!(room.id, 20);
    assert!(harness.presence.is_subscribed("s", 20));
}

#[tokio::test]
async fn private_room_nonmember_sees_room_not_found() {
    let harness = Harness::with_default_room();
    harness
        .directory
        .add_room(20, "backroom", Visibility::Private, 1);

    let session = harness.connect("s", 3).await;
    let result = harness.chat.join(&session.session_id, 3, 20).await;

    assert!(matches!(result, Err(ChatError::RoomNotFound)));
    assert!(!harness.presence.is_subscribed("s", 20));
}
