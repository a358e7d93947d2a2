//! WebSocket Frame Types
//!
//! JSON wire format for the gateway. Frames are tagged by a `type` field;
//! snowflake IDs travel as strings so JavaScript clients keep precision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::events::OutboundEvent;
use crate::domain::entities::{Message, Notification};

/// Incoming client frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame of every connection
    Auth { token: String },

    Send {
        room_id: String,
        body: String,
        #[serde(default)]
        reply_to: Option<String>,
    },

    Typing {
        room_id: String,
        #[serde(default = "default_true")]
        is_typing: bool,
    },

    Join { room_id: String },

    Leave { room_id: String },

    Moderate {
        action: String,
        #[serde(default)]
        target_id: Option<String>,
        #[serde(default)]
        message_id: Option<String>,
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        duration_secs: Option<u64>,
    },
}

fn default_true() -> bool {
    true
}

/// Outgoing server frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Ready {
        session_id: String,
        user_id: String,
        rooms: Vec<String>,
    },

    Message {
        id: String,
        room_id: String,
        sender_id: String,
        body: String,
        sequence: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
        created_at: DateTime<Utc>,
    },

    MessageDeleted {
        room_id: String,
        message_id: String,
    },

    Typing {
        room_id: String,
        user_id: String,
        is_typing: bool,
    },

    Presence {
        room_id: String,
        user_id: String,
        online: bool,
    },

    Notification {
        id: String,
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        actor_id: Option<String>,
        body: String,
        created_at: DateTime<Utc>,
    },

    /// Moderation action announced to a room
    System {
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        action: String,
        target_id: String,
        actor_id: String,
        reason: String,
    },

    Error { code: String, message: String },
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    fn message(m: Message) -> Self {
        Self::Message {
            id: m.id.to_string(),
            room_id: m.room_id.to_string(),
            sender_id: m.sender_id.to_string(),
            body: m.body,
            sequence: m.sequence,
            reply_to: m.reply_to.map(|id| id.to_string()),
            created_at: m.created_at,
        }
    }

    fn notification(n: Notification) -> Self {
        Self::Notification {
            id: n.id.to_string(),
            kind: n.kind.as_str().to_string(),
            room_id: n.room_id.map(|id| id.to_string()),
            message_id: n.message_id.map(|id| id.to_string()),
            actor_id: n.actor_id.map(|id| id.to_string()),
            body: n.body,
            created_at: n.created_at,
        }
    }
}

impl From<OutboundEvent> for ServerFrame {
    fn from(event: OutboundEvent) -> Self {
        match event {
            OutboundEvent::Ready {
                session_id,
                user_id,
                rooms,
            } => Self::Ready {
                session_id,
                user_id: user_id.to_string(),
                rooms: rooms.iter().map(|id| id.to_string()).collect(),
            },
            OutboundEvent::Message(m) => Self::message(m),
            OutboundEvent::MessageDeleted { room_id, message_id } => Self::MessageDeleted {
                room_id: room_id.to_string(),
                message_id: message_id.to_string(),
            },
            OutboundEvent::Typing {
                room_id,
                user_id,
                is_typing,
            } => Self::Typing {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                is_typing,
            },
            OutboundEvent::Presence {
                room_id,
                user_id,
                online,
            } => Self::Presence {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
                online,
            },
            OutboundEvent::Notification(n) => Self::notification(n),
            OutboundEvent::Moderation {
                room_id,
                kind,
                target_id,
                actor_id,
                reason,
            } => Self::System {
                room_id: room_id.map(|id| id.to_string()),
                action: kind.as_str().to_string(),
                target_id: target_id.to_string(),
                actor_id: actor_id.to_string(),
                reason,
            },
            OutboundEvent::Error { code, message } => Self::Error { code, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_auth_frame_parses() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "auth", "token": "abc"})).unwrap();
        assert!(matches!(frame, ClientFrame::Auth { token } if token == "abc"));
    }

    #[test]
    fn test_send_frame_parses_with_optional_reply() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "send", "room_id": "10", "body": "hi"
        }))
        .unwrap();
        assert!(matches!(frame, ClientFrame::Send { reply_to: None, .. }));
    }

    #[test]
    fn test_typing_defaults_to_true() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "typing", "room_id": "10"})).unwrap();
        assert!(matches!(frame, ClientFrame::Typing { is_typing: true, .. }));
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_value(json!({"type": "bogus"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_message_frame_serializes_ids_as_strings() {
        let frame = ServerFrame::from(OutboundEvent::MessageDeleted {
            room_id: 10,
            message_id: 99,
        });
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"type": "message_deleted", "room_id": "10", "message_id": "99"})
        );
    }

    #[test]
    fn test_error_frame_shape() {
        let frame = ServerFrame::error("muted", "you are muted");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "code": "muted", "message": "you are muted"})
        );
    }
}
