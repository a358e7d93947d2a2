//! Notification dispatcher.
//!
//! Computes mention, reply, invite, and warning notifications from
//! accepted messages and moderation actions. Online recipients get a live
//! frame; offline recipients get a persisted record. Warnings always get
//! both a persisted record and, when online, a live frame.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::application::events::OutboundEvent;
use crate::application::presence::PresenceStore;
use crate::domain::entities::{IdentityProvider, Message, Notification, NotificationKind};
use crate::domain::persistence::PersistenceSink;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Bounded message-id to sender-id index for resolving reply recipients
/// without reading messages back from the durable store.
struct RecentIndex {
    senders: HashMap<i64, i64>,
    order: VecDeque<i64>,
    capacity: usize,
}

impl RecentIndex {
    fn new(capacity: usize) -> Self {
        Self {
            senders: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn record(&mut self, message_id: i64, sender_id: i64) {
        if self.senders.insert(message_id, sender_id).is_none() {
            self.order.push_back(message_id);
        }
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.senders.remove(&evicted);
            }
        }
    }

    fn sender_of(&self, message_id: i64) -> Option<i64> {
        self.senders.get(&message_id).copied()
    }
}

/// Extract @name mention tokens from a message body. Trailing punctuation
/// is stripped and duplicates are collapsed, preserving first occurrence.
pub fn parse_mentions(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for token in body.split_whitespace() {
        let Some(raw) = token.strip_prefix('@') else {
            continue;
        };
        let name = raw.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '-');
        if !name.is_empty() && seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }
    names
}

/// Computes and routes notifications.
pub struct NotificationDispatcher {
    presence: Arc<PresenceStore>,
    identity: Arc<dyn IdentityProvider>,
    sink: Arc<dyn PersistenceSink>,
    ids: Arc<SnowflakeGenerator>,
    recent: Mutex<RecentIndex>,
}

impl NotificationDispatcher {
    pub fn new(
        presence: Arc<PresenceStore>,
        identity: Arc<dyn IdentityProvider>,
        sink: Arc<dyn PersistenceSink>,
        ids: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            presence,
            identity,
            sink,
            ids,
            recent: Mutex::new(RecentIndex::new(4096)),
        }
    }

    /// Derive reply and mention notifications from an accepted message.
    /// The sender never notifies themself; a recipient who is both the
    /// reply target and mentioned gets only the reply notification.
    pub async fn on_message(&self, message: &Message) {
        self.recent.lock().record(message.id, message.sender_id);

        let mut notified: HashSet<i64> = HashSet::new();
        notified.insert(message.sender_id);

        if let Some(reply_to) = message.reply_to {
            let recipient = self.recent.lock().sender_of(reply_to);
            if let Some(recipient) = recipient {
                if notified.insert(recipient) {
                    self.dispatch(
                        NotificationKind::Reply,
                        recipient,
                        Some(message.room_id),
                        Some(message.id),
                        Some(message.sender_id),
                        message.body.clone(),
                    )
                    .await;
                }
            }
        }

        for name in parse_mentions(&message.body) {
            let recipient = match self.identity.find_by_name(&name).await {
                Ok(Some(id)) => id,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Mention lookup failed");
                    continue;
                }
            };
            if notified.insert(recipient) {
                self.dispatch(
                    NotificationKind::Mention,
                    recipient,
                    Some(message.room_id),
                    Some(message.id),
                    Some(message.sender_id),
                    message.body.clone(),
                )
                .await;
            }
        }
    }

    /// Route an invite notification to a user. This is the seam the
    /// external room-management integration calls when it records an
    /// invite; the core itself never originates invites.
    pub async fn on_invite(&self, recipient_id: i64, room_id: i64, actor_id: i64, body: String) {
        self.dispatch(
            NotificationKind::Invite,
            recipient_id,
            Some(room_id),
            None,
            Some(actor_id),
            body,
        )
        .await;
    }

    /// A moderation warning: persisted always, plus a live frame when the
    /// target is online. A sink failure fails the whole warn action.
    pub async fn warn(
        &self,
        target_id: i64,
        actor_id: i64,
        room_id: Option<i64>,
        reason: String,
    ) -> Result<(), AppError> {
        let notification = self.build(
            NotificationKind::Warning,
            target_id,
            room_id,
            None,
            Some(actor_id),
            reason,
        );
        self.sink.store_notification(&notification).await?;

        if self.presence.is_online(target_id) {
            self.presence
                .send_to_user(target_id, OutboundEvent::Notification(notification))
                .await;
        }
        Ok(())
    }

    /// Live frame when online, persisted record when offline. Persistence
    /// failures for routine notifications are logged and swallowed; they
    /// never fail the message that produced them.
    async fn dispatch(
        &self,
        kind: NotificationKind,
        recipient_id: i64,
        room_id: Option<i64>,
        message_id: Option<i64>,
        actor_id: Option<i64>,
        body: String,
    ) {
        let notification = self.build(kind, recipient_id, room_id, message_id, actor_id, body);

        if self.presence.is_online(recipient_id) {
            self.presence
                .send_to_user(recipient_id, OutboundEvent::Notification(notification))
                .await;
        } else if let Err(e) = self.sink.store_notification(&notification).await {
            tracing::warn!(
                recipient_id,
                kind = kind.as_str(),
                error = %e,
                "Failed to persist notification"
            );
        }
    }

    fn build(
        &self,
        kind: NotificationKind,
        recipient_id: i64,
        room_id: Option<i64>,
        message_id: Option<i64>,
        actor_id: Option<i64>,
        body: String,
    ) -> Notification {
        Notification {
            id: self.ids.generate(),
            kind,
            recipient_id,
            room_id,
            message_id,
            actor_id,
            body,
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_mentions_basic() {
        assert_eq!(parse_mentions("hi @alice and @bob"), vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_mentions_strips_punctuation() {
        assert_eq!(parse_mentions("thanks @alice!"), vec!["alice"]);
        assert_eq!(parse_mentions("cc @bob, @carol."), vec!["bob", "carol"]);
    }

    #[test]
    fn test_parse_mentions_dedupes() {
        assert_eq!(parse_mentions("@alice @alice @alice"), vec!["alice"]);
    }

    #[test]
    fn test_parse_mentions_ignores_bare_at_and_email() {
        assert!(parse_mentions("see you @ noon").is_empty());
        // Only tokens that start with '@' count
        assert!(parse_mentions("mail alice@example.com").is_empty());
    }

    #[test]
    fn test_recent_index_evicts_oldest() {
        let mut index = RecentIndex::new(2);
        index.record(1, 100);
        index.record(2, 200);
        index.record(3, 300);

        assert_eq!(index.sender_of(1), None);
        assert_eq!(index.sender_of(2), Some(200));
        assert_eq!(index.sender_of(3), Some(300));
    }
}
