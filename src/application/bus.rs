//! Room broadcast bus.
//!
//! Assigns per-room sequence numbers and fans events out to the room's
//! subscribed sessions. Sequence assignment and fan-out happen under the
//! room's member-map lock, so sequence order equals delivery order for
//! every subscriber and no two messages in a room share a sequence number.

use std::sync::Arc;

use dashmap::DashMap;

use super::events::OutboundEvent;
use super::presence::PresenceStore;
use crate::domain::entities::Message;

/// Per-room sequencing and fan-out.
pub struct RoomBus {
    presence: Arc<PresenceStore>,
    /// Last assigned sequence number per room
    sequences: DashMap<i64, u64>,
}

impl RoomBus {
    pub fn new(presence: Arc<PresenceStore>) -> Self {
        Self {
            presence,
            sequences: DashMap::new(),
        }
    }

    /// Assign the next sequence number and deliver the message to every
    /// subscribed session. Delivery to each session awaits queue space;
    /// the room lock is held throughout, which is what makes the
    /// per-room order total.
    pub async fn publish_message(&self, mut message: Message) -> Message {
        let room = self.presence.room_handle(message.room_id);
        let members = room.lock().await;

        // The entry guard is dropped before any await; concurrent
        // publishers are already serialized by the room lock above.
        let sequence = {
            let mut entry = self.sequences.entry(message.room_id).or_insert(0);
            *entry += 1;
            *entry
        };
        message.sequence = sequence;

        let event = OutboundEvent::Message(message.clone());
        for handle in members.values() {
            handle.deliver(event.clone()).await;
        }
        drop(members);

        tracing::debug!(
            room_id = message.room_id,
            message_id = message.id,
            sequence,
            "Message published"
        );
        message
    }

    /// Deliver an unsequenced critical event (moderation notices, message
    /// deletions) to every subscribed session, under the room lock so it
    /// interleaves cleanly with sequenced messages.
    pub async fn publish_system(&self, room_id: i64, event: OutboundEvent) {
        let room = self.presence.room_handle(room_id);
        let members = room.lock().await;
        for handle in members.values() {
            handle.deliver(event.clone()).await;
        }
    }

    /// Deliver a best-effort event (typing, presence). Sessions with full
    /// buffers miss it; nobody waits.
    pub async fn publish_lossy(&self, room_id: i64, event: OutboundEvent) {
        let room = self.presence.room_handle(room_id);
        let members = room.lock().await;
        for handle in members.values() {
            handle.deliver_lossy(event.clone());
        }
    }

    /// Last sequence number assigned in a room, zero if none.
    pub fn current_sequence(&self, room_id: i64) -> u64 {
        self.sequences.get(&room_id).map(|s| *s).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::presence::SessionHandle;
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn message(room_id: i64, id: i64) -> Message {
        Message {
            id,
            room_id,
            sender_id: 1,
            body: "hello".to_string(),
            sequence: 0,
            reply_to: None,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    async fn attach(
        presence: &PresenceStore,
        session_id: &str,
        user_id: i64,
        room_id: i64,
        buffer: usize,
    ) -> mpsc::Receiver<OutboundEvent> {
        let (events, rx) = mpsc::channel(buffer);
        let (control, _control_rx) = mpsc::unbounded_channel();
        presence.register(SessionHandle::new(
            session_id.to_string(),
            user_id,
            events,
            control,
        ));
        presence.subscribe(session_id, room_id).await;
        rx
    }

    #[tokio::test]
    async fn test_sequences_are_strictly_increasing() {
        let presence = Arc::new(PresenceStore::new());
        let bus = RoomBus::new(presence.clone());
        let mut rx = attach(&presence, "s1", 1, 10, 16).await;

        for id in 1..=5 {
            bus.publish_message(message(10, id)).await;
        }

        let mut last = 0;
        for _ in 0..5 {
            match rx.recv().await {
                Some(OutboundEvent::Message(m)) => {
                    assert_eq!(m.sequence, last + 1);
                    last = m.sequence;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_rooms_sequence_independently() {
        let presence = Arc::new(PresenceStore::new());
        let bus = RoomBus::new(presence.clone());

        let a = bus.publish_message(message(10, 1)).await;
        let b = bus.publish_message(message(11, 2)).await;
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 1);
        assert_eq!(bus.current_sequence(10), 1);
        assert_eq!(bus.current_sequence(11), 1);
    }

    #[tokio::test]
    async fn test_lossy_publish_drops_on_full_buffer() {
        let presence = Arc::new(PresenceStore::new());
        let bus = RoomBus::new(presence.clone());
        let mut rx = attach(&presence, "s1", 1, 10, 1).await;

        let typing = OutboundEvent::Typing {
            room_id: 10,
            user_id: 2,
            is_typing: true,
        };
        bus.publish_lossy(10, typing.clone()).await;
        bus.publish_lossy(10, typing).await;

        assert!(matches!(rx.recv().await, Some(OutboundEvent::Typing { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_session_misses_broadcast() {
        let presence = Arc::new(PresenceStore::new());
        let bus = RoomBus::new(presence.clone());
        let mut rx = attach(&presence, "s1", 1, 10, 16).await;

        presence.unsubscribe("s1", 10).await;
        bus.publish_message(message(10, 1)).await;
        assert!(rx.try_recv().is_err());
    }
}
