//! Presence Store
//!
//! Tracks which sessions are connected, which user owns each session, and
//! which rooms each session is subscribed to. Per-room member maps sit
//! behind one async mutex per room id: the broadcast bus fans out under
//! that lock, so unregister/unsubscribe are atomic with respect to
//! in-flight broadcasts: a delivery either fully reaches a session or
//! fully misses it, and nothing is delivered after unregister returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use super::events::{CloseReason, OutboundEvent, SessionControl};

/// Per-room member map guarded by the room's lock.
pub type RoomMembers = Arc<Mutex<HashMap<String, SessionHandle>>>;

/// Delivery handle for one connected session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub user_id: i64,
    events: mpsc::Sender<OutboundEvent>,
    control: mpsc::UnboundedSender<SessionControl>,
}

impl SessionHandle {
    pub fn new(
        session_id: String,
        user_id: i64,
        events: mpsc::Sender<OutboundEvent>,
        control: mpsc::UnboundedSender<SessionControl>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            events,
            control,
        }
    }

    /// Queue a critical event, waiting for buffer space (backpressure).
    /// Returns false if the session's receiver is gone.
    pub async fn deliver(&self, event: OutboundEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Queue a non-critical event, dropping it if the buffer is full.
    pub fn deliver_lossy(&self, event: OutboundEvent) -> bool {
        self.events.try_send(event).is_ok()
    }

    /// Signal the session's event loop to begin `Closing`.
    pub fn force_close(&self, reason: CloseReason, message: String) {
        let _ = self
            .control
            .send(SessionControl::ForceClose { reason, message });
    }
}

struct SessionEntry {
    handle: SessionHandle,
    rooms: parking_lot::Mutex<HashSet<i64>>,
}

/// Connection registry and room subscription state.
pub struct PresenceStore {
    /// Per-room member maps; each map is its room's single lock domain
    rooms: DashMap<i64, RoomMembers>,
    /// Session ID to session entry
    sessions: DashMap<String, SessionEntry>,
    /// User ID to session IDs (one user can have multiple sessions)
    users: DashMap<i64, HashSet<String>>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            sessions: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Register a newly authenticated session.
    pub fn register(&self, handle: SessionHandle) {
        let session_id = handle.session_id.clone();
        let user_id = handle.user_id;

        self.sessions.insert(
            session_id.clone(),
            SessionEntry {
                handle,
                rooms: parking_lot::Mutex::new(HashSet::new()),
            },
        );
        self.users
            .entry(user_id)
            .or_default()
            .insert(session_id.clone());

        tracing::info!(user_id, session_id = %session_id, "Session registered");
    }

    /// Remove a session from every room it was subscribed to and drop its
    /// registration. Each room's lock is taken in turn, so once this
    /// returns no broadcast can deliver to the session.
    pub async fn unregister(&self, session_id: &str) -> Option<(i64, Vec<i64>)> {
        let (_, entry) = self.sessions.remove(session_id)?;
        let user_id = entry.handle.user_id;
        let room_ids: Vec<i64> = entry.rooms.lock().drain().collect();

        for room_id in &room_ids {
            if let Some(members) = self.room_members(*room_id) {
                members.lock().await.remove(session_id);
            }
        }

        if let Some(mut sessions) = self.users.get_mut(&user_id) {
            sessions.remove(session_id);
            let empty = sessions.is_empty();
            drop(sessions);
            if empty {
                self.users.remove_if(&user_id, |_, s| s.is_empty());
            }
        }

        tracing::info!(user_id, session_id = %session_id, "Session unregistered");
        Some((user_id, room_ids))
    }

    /// Subscribe a session to a room. Returns false for unknown sessions.
    pub async fn subscribe(&self, session_id: &str, room_id: i64) -> bool {
        let handle = match self.sessions.get(session_id) {
            Some(entry) => {
                entry.rooms.lock().insert(room_id);
                entry.handle.clone()
            }
            None => return false,
        };

        self.room_handle(room_id)
            .lock()
            .await
            .insert(session_id.to_string(), handle);
        true
    }

    /// Unsubscribe a session from a room, atomically with respect to
    /// broadcasts in that room.
    pub async fn unsubscribe(&self, session_id: &str, room_id: i64) -> bool {
        let known = match self.sessions.get(session_id) {
            Some(entry) => entry.rooms.lock().remove(&room_id),
            None => false,
        };
        if let Some(members) = self.room_members(room_id) {
            members.lock().await.remove(session_id);
        }
        known
    }

    /// The member map for a room, created on first use. The broadcast bus
    /// locks this map for sequence assignment and fan-out.
    pub fn room_handle(&self, room_id: i64) -> RoomMembers {
        self.rooms
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .clone()
    }

    fn room_members(&self, room_id: i64) -> Option<RoomMembers> {
        self.rooms.get(&room_id).map(|m| m.clone())
    }

    /// Session IDs currently subscribed to a room.
    pub async fn members_of(&self, room_id: i64) -> Vec<String> {
        match self.room_members(room_id) {
            Some(members) => members.lock().await.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Check if a user has at least one connected session.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.users
            .get(&user_id)
            .map(|sessions| !sessions.is_empty())
            .unwrap_or(false)
    }

    /// Check if a session is subscribed to a room.
    pub fn is_subscribed(&self, session_id: &str, room_id: i64) -> bool {
        self.sessions
            .get(session_id)
            .map(|entry| entry.rooms.lock().contains(&room_id))
            .unwrap_or(false)
    }

    /// Rooms any of a user's sessions are subscribed to.
    pub fn rooms_of_user(&self, user_id: i64) -> Vec<i64> {
        let mut rooms = HashSet::new();
        for session_id in self.session_ids_of(user_id) {
            if let Some(entry) = self.sessions.get(&session_id) {
                rooms.extend(entry.rooms.lock().iter().copied());
            }
        }
        rooms.into_iter().collect()
    }

    /// Deliver an event to every session of a user; critical events wait
    /// for queue space, the rest are dropped when a queue is full.
    pub async fn send_to_user(&self, user_id: i64, event: OutboundEvent) {
        for handle in self.handles_of(user_id) {
            if event.is_critical() {
                handle.deliver(event.clone()).await;
            } else {
                handle.deliver_lossy(event.clone());
            }
        }
    }

    /// Force every session of a user into `Closing`.
    pub fn force_close_user(&self, user_id: i64, reason: CloseReason, message: &str) {
        for handle in self.handles_of(user_id) {
            handle.force_close(reason, message.to_string());
        }
    }

    /// Remove every session of a user from one room (room-scoped bans).
    pub async fn remove_user_from_room(&self, user_id: i64, room_id: i64) {
        for session_id in self.session_ids_of(user_id) {
            self.unsubscribe(&session_id, room_id).await;
        }
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session_ids_of(&self, user_id: i64) -> Vec<String> {
        self.users
            .get(&user_id)
            .map(|sessions| sessions.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn handles_of(&self, user_id: i64) -> Vec<SessionHandle> {
        self.session_ids_of(user_id)
            .into_iter()
            .filter_map(|sid| self.sessions.get(&sid).map(|e| e.handle.clone()))
            .collect()
    }
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(session_id: &str, user_id: i64) -> (SessionHandle, mpsc::Receiver<OutboundEvent>) {
        let (events, rx) = mpsc::channel(16);
        let (control, _control_rx) = mpsc::unbounded_channel();
        (
            SessionHandle::new(session_id.to_string(), user_id, events, control),
            rx,
        )
    }

    #[tokio::test]
    async fn test_register_subscribe_members() {
        let store = PresenceStore::new();
        let (h, _rx) = handle("s1", 1);
        store.register(h);
        assert!(store.subscribe("s1", 10).await);

        assert_eq!(store.members_of(10).await, vec!["s1".to_string()]);
        assert!(store.is_online(1));
        assert!(store.is_subscribed("s1", 10));
    }

    #[tokio::test]
    async fn test_unregister_clears_all_rooms() {
        let store = PresenceStore::new();
        let (h, _rx) = handle("s1", 1);
        store.register(h);
        store.subscribe("s1", 10).await;
        store.subscribe("s1", 11).await;

        let (user_id, mut rooms) = store.unregister("s1").await.unwrap();
        rooms.sort_unstable();
        assert_eq!(user_id, 1);
        assert_eq!(rooms, vec![10, 11]);
        assert!(store.members_of(10).await.is_empty());
        assert!(store.members_of(11).await.is_empty());
        assert!(!store.is_online(1));
    }

    #[tokio::test]
    async fn test_subscribe_unknown_session_rejected() {
        let store = PresenceStore::new();
        assert!(!store.subscribe("ghost", 10).await);
    }

    #[tokio::test]
    async fn test_user_online_with_second_session() {
        let store = PresenceStore::new();
        let (h1, _rx1) = handle("s1", 1);
        let (h2, _rx2) = handle("s2", 1);
        store.register(h1);
        store.register(h2);

        store.unregister("s1").await;
        assert!(store.is_online(1));
        store.unregister("s2").await;
        assert!(!store.is_online(1));
    }
}
