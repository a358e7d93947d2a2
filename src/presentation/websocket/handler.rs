//! WebSocket Connection Handler
//!
//! Drives one connection through its lifecycle: auth handshake, session
//! registration and auto-subscribe, the serving loop, and teardown. All
//! outbound traffic flows through the session's bounded event queue; a
//! dedicated writer task drains it onto the socket.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use super::frames::{ClientFrame, ServerFrame};
use super::session::SessionState;
use crate::application::events::{OutboundEvent, SessionControl};
use crate::application::presence::SessionHandle;
use crate::application::services::chat_service::ChatError;
use crate::application::services::moderation_service::ModerationRequest;
use crate::domain::entities::{Identity, ModerationKind};
use crate::infrastructure::metrics;
use crate::shared::snowflake;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

enum FrameOutcome {
    Continue,
    Close,
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4().to_string();
    let mut session = SessionState::new(session_id.clone());

    tracing::debug!(session_id = %session_id, "New WebSocket connection");

    let (sender, mut receiver) = socket.split();

    let buffer = state.settings.websocket.outbound_buffer;
    let (events_tx, events_rx) = mpsc::channel::<OutboundEvent>(buffer);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<SessionControl>();

    let writer_task = tokio::spawn(write_events(sender, events_rx));

    // Auth handshake: the first frame must be auth, within the deadline
    let handshake = Duration::from_secs(state.settings.websocket.handshake_timeout_secs);
    let identity = match timeout(handshake, read_auth(&mut receiver, &state)).await {
        Ok(Ok(identity)) => identity,
        Ok(Err(frame)) => {
            let _ = events_tx.send(OutboundEvent::Error {
                code: frame.0,
                message: frame.1,
            })
            .await;
            shutdown_writer(writer_task, events_tx).await;
            return;
        }
        Err(_) => {
            tracing::debug!(session_id = %session_id, "Auth timeout");
            shutdown_writer(writer_task, events_tx).await;
            return;
        }
    };

    // Global bans deny the handshake itself
    if let Err(reason) = state.filter.check_connect(identity.user_id) {
        metrics::record_denial(reason.code());
        let _ = events_tx
            .send(OutboundEvent::Error {
                code: reason.code().to_string(),
                message: reason.to_string(),
            })
            .await;
        shutdown_writer(writer_task, events_tx).await;
        return;
    }

    let user_id = identity.user_id;
    session.authenticate(identity);

    state.presence.register(SessionHandle::new(
        session_id.clone(),
        user_id,
        events_tx.clone(),
        control_tx,
    ));
    metrics::SESSIONS_ACTIVE.inc();

    let rooms = state.chat.auto_subscribe(&session_id, user_id).await;
    let _ = events_tx
        .send(OutboundEvent::Ready {
            session_id: session_id.clone(),
            user_id,
            rooms,
        })
        .await;
    session.activate();

    tracing::info!(user_id, session_id = %session_id, "Session active");

    // Serving loop
    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        match handle_frame(&text, &session, &state, &events_tx).await {
                            FrameOutcome::Continue => {}
                            FrameOutcome::Close => break,
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        tracing::debug!(session_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong is handled by axum; binary is ignored
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            control = control_rx.recv() => {
                match control {
                    Some(SessionControl::ForceClose { reason, message }) => {
                        let _ = events_tx
                            .send(OutboundEvent::Error {
                                code: reason.code().to_string(),
                                message,
                            })
                            .await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Teardown: unregister first so no broadcast can reach this session,
    // then announce the offline transition to the rooms it left.
    session.begin_close();
    if let Some((user_id, room_ids)) = state.presence.unregister(&session_id).await {
        state.chat.announce_offline(user_id, &room_ids).await;
    }
    metrics::SESSIONS_ACTIVE.dec();
    session.close();

    shutdown_writer(writer_task, events_tx).await;
    tracing::info!(user_id, session_id = %session_id, "Session closed");
}

/// Drain the event queue onto the socket, one JSON text frame per event.
async fn write_events(
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut events_rx: mpsc::Receiver<OutboundEvent>,
) {
    while let Some(event) = events_rx.recv().await {
        let frame = ServerFrame::from(event);
        let text = match serde_json::to_string(&frame) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize frame");
                continue;
            }
        };
        if sender.send(WsMessage::Text(text.into())).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

/// Drop our queue handle and give the writer a moment to flush the tail.
async fn shutdown_writer(
    writer_task: tokio::task::JoinHandle<()>,
    events_tx: mpsc::Sender<OutboundEvent>,
) {
    drop(events_tx);
    if timeout(Duration::from_secs(5), writer_task).await.is_err() {
        tracing::warn!("Writer task did not drain in time");
    }
}

/// Wire code for every handshake rejection. Distinct from
/// `authorization-denied`, which is about moderation scope.
const AUTH_FAILED: &str = "authentication-failed";

/// Read frames until a valid auth frame arrives and resolve its token.
/// Returns a (code, message) pair for frames that cannot be accepted.
async fn read_auth(
    receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
) -> Result<Identity, (String, String)> {
    loop {
        let msg = receiver
            .next()
            .await
            .ok_or_else(|| (AUTH_FAILED.to_string(), "connection closed".to_string()))?;

        let text = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => {
                return Err((AUTH_FAILED.to_string(), "connection closed".to_string()))
            }
            Ok(_) => continue,
            Err(e) => return Err((AUTH_FAILED.to_string(), e.to_string())),
        };

        let token = parse_auth_token(&text)?;

        return state
            .identity
            .resolve_token(&token)
            .await
            .map_err(|e| (AUTH_FAILED.to_string(), e.to_string()));
    }
}

/// Interpret a handshake frame. Anything but a well-formed auth frame
/// fails the handshake.
fn parse_auth_token(text: &str) -> Result<String, (String, String)> {
    let frame: ClientFrame = serde_json::from_str(text).map_err(|_| {
        (
            AUTH_FAILED.to_string(),
            "expected an auth frame".to_string(),
        )
    })?;
    match frame {
        ClientFrame::Auth { token } => Ok(token),
        _ => Err((
            AUTH_FAILED.to_string(),
            "first frame must be auth".to_string(),
        )),
    }
}

/// Dispatch one inbound frame from an active session.
async fn handle_frame(
    text: &str,
    session: &SessionState,
    state: &AppState,
    events_tx: &mpsc::Sender<OutboundEvent>,
) -> FrameOutcome {
    let identity = match &session.identity {
        Some(identity) => identity,
        None => return FrameOutcome::Close,
    };
    let session_id = &session.session_id;
    let user_id = identity.user_id;

    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            send_error(events_tx, "invalid-frame", &e.to_string()).await;
            return FrameOutcome::Continue;
        }
    };

    match frame {
        ClientFrame::Auth { .. } => {
            // Already authenticated; ignore
            FrameOutcome::Continue
        }

        ClientFrame::Send {
            room_id,
            body,
            reply_to,
        } => {
            let Some(room_id) = parse_id(&room_id) else {
                send_error(events_tx, "invalid-frame", "bad room id").await;
                return FrameOutcome::Continue;
            };
            let reply_to = reply_to.as_deref().and_then(parse_id);

            match state.chat.send(session_id, user_id, room_id, body, reply_to).await {
                Ok(outcome) => {
                    metrics::MESSAGES_PUBLISHED.inc();
                    if !outcome.durable {
                        send_error(
                            events_tx,
                            "persistence-failure",
                            "message delivered but not stored",
                        )
                        .await;
                    }
                    FrameOutcome::Continue
                }
                Err(e) => chat_error(state, session_id, room_id, e, events_tx).await,
            }
        }

        ClientFrame::Typing { room_id, is_typing } => {
            let Some(room_id) = parse_id(&room_id) else {
                return FrameOutcome::Continue;
            };
            match state.chat.typing(session_id, user_id, room_id, is_typing).await {
                Ok(()) => FrameOutcome::Continue,
                Err(e) => chat_error(state, session_id, room_id, e, events_tx).await,
            }
        }

        ClientFrame::Join { room_id } => {
            let Some(room_id) = parse_id(&room_id) else {
                send_error(events_tx, "invalid-frame", "bad room id").await;
                return FrameOutcome::Continue;
            };
            match state.chat.join(session_id, user_id, room_id).await {
                Ok(_) => FrameOutcome::Continue,
                Err(e) => chat_error(state, session_id, room_id, e, events_tx).await,
            }
        }

        ClientFrame::Leave { room_id } => {
            let Some(room_id) = parse_id(&room_id) else {
                send_error(events_tx, "invalid-frame", "bad room id").await;
                return FrameOutcome::Continue;
            };
            match state.chat.leave(session_id, user_id, room_id).await {
                Ok(()) => FrameOutcome::Continue,
                Err(e) => chat_error(state, session_id, room_id, e, events_tx).await,
            }
        }

        ClientFrame::Moderate {
            action,
            target_id,
            message_id,
            room_id,
            reason,
            duration_secs,
        } => {
            let Some(kind) = ModerationKind::from_str(&action) else {
                send_error(events_tx, "invalid-frame", "unknown moderation action").await;
                return FrameOutcome::Continue;
            };
            let request = ModerationRequest {
                kind,
                target_id: target_id.as_deref().and_then(parse_id),
                message_id: message_id.as_deref().and_then(parse_id),
                room_id: room_id.as_deref().and_then(parse_id),
                reason: reason.unwrap_or_default(),
                duration_secs,
            };

            match state.moderation.execute(user_id, identity.role, request).await {
                Ok(()) => {
                    metrics::record_moderation(kind.as_str());
                    FrameOutcome::Continue
                }
                Err(e) => {
                    send_error(events_tx, e.code(), &e.to_string()).await;
                    FrameOutcome::Continue
                }
            }
        }
    }
}

/// Report a chat failure to the session and apply denial side effects.
async fn chat_error(
    state: &AppState,
    session_id: &str,
    room_id: i64,
    error: ChatError,
    events_tx: &mpsc::Sender<OutboundEvent>,
) -> FrameOutcome {
    let mut outcome = FrameOutcome::Continue;
    if let ChatError::Denied(reason) = &error {
        metrics::record_denial(reason.code());
        // A room ban discovered here means the subscription is stale
        if matches!(reason, crate::domain::services::DenyReason::BannedRoom) {
            state.presence.unsubscribe(session_id, room_id).await;
        }
        if reason.closes_session() {
            outcome = FrameOutcome::Close;
        }
    }
    send_error(events_tx, error.code(), &error.to_string()).await;
    outcome
}

async fn send_error(events_tx: &mpsc::Sender<OutboundEvent>, code: &str, message: &str) {
    let _ = events_tx
        .send(OutboundEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        })
        .await;
}

fn parse_id(s: &str) -> Option<i64> {
    snowflake::from_string(s).ok()
}
