//! Shared test harness: the application core wired against in-memory
//! infrastructure, with fake sessions attached through real event queues.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use roomchat::application::{
    ChatService, EnforcementFilter, ModerationService, NotificationDispatcher, OutboundEvent,
    PresenceStore, RoomBus, SanctionStore, SessionControl, SessionHandle,
};
use roomchat::domain::entities::{Role, Visibility};
use roomchat::infrastructure::directory::memory::InMemoryRoomDirectory;
use roomchat::infrastructure::identity::memory::StaticIdentityProvider;
use roomchat::infrastructure::persistence::memory::InMemorySink;
use roomchat::shared::snowflake::SnowflakeGenerator;

pub const KICK_COOLDOWN_SECS: u64 = 60;

pub struct Harness {
    pub presence: Arc<PresenceStore>,
    pub bus: Arc<RoomBus>,
    pub sanctions: Arc<SanctionStore>,
    pub filter: Arc<EnforcementFilter>,
    pub chat: Arc<ChatService>,
    pub moderation: Arc<ModerationService>,
    pub notifier: Arc<NotificationDispatcher>,
    pub sink: Arc<InMemorySink>,
    pub identity: Arc<StaticIdentityProvider>,
    pub directory: Arc<InMemoryRoomDirectory>,
}

impl Harness {
    pub fn new() -> Self {
        let sink = Arc::new(InMemorySink::new());
        let identity = Arc::new(StaticIdentityProvider::new());
        let directory = Arc::new(InMemoryRoomDirectory::new());
        let ids = Arc::new(SnowflakeGenerator::new(1, 1));

        let presence = Arc::new(PresenceStore::new());
        let bus = Arc::new(RoomBus::new(presence.clone()));
        let sanctions = Arc::new(SanctionStore::new(sink.clone(), ids.clone()));
        let filter = Arc::new(EnforcementFilter::new(sanctions.clone()));
        let notifier = Arc::new(NotificationDispatcher::new(
            presence.clone(),
            identity.clone(),
            sink.clone(),
            ids.clone(),
        ));
        let chat = Arc::new(ChatService::new(
            presence.clone(),
            bus.clone(),
            filter.clone(),
            directory.clone(),
            sink.clone(),
            notifier.clone(),
            ids.clone(),
        ));
        let moderation = Arc::new(ModerationService::new(
            presence.clone(),
            bus.clone(),
            sanctions.clone(),
            directory.clone(),
            identity.clone(),
            sink.clone(),
            notifier.clone(),
            ids,
            KICK_COOLDOWN_SECS,
        ));

        Self {
            presence,
            bus,
            sanctions,
            filter,
            chat,
            moderation,
            notifier,
            sink,
            identity,
            directory,
        }
    }

    /// A harness with one public room (id 10) owned by a staff user (1)
    /// and two member accounts (2, 3), everyone a member of the room.
    pub fn with_default_room() -> Self {
        let harness = Self::new();
        harness.identity.add_user(1, "mod", Role::Staff, "token-mod");
        harness.identity.add_user(2, "alice", Role::Member, "token-alice");
        harness.identity.add_user(3, "bob", Role::Member, "token-bob");
        harness.directory.add_room(10, "general", Visibility::Public, 1);
        harness.directory.add_member(10, 2);
        harness.directory.add_member(10, 3);
        harness
    }

    /// Attach a fake session: register it and auto-subscribe to the
    /// user's rooms, exactly as the gateway does after the handshake.
    pub async fn connect(&self, session_id: &str, user_id: i64) -> TestSession {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        self.presence.register(SessionHandle::new(
            session_id.to_string(),
            user_id,
            events_tx,
            control_tx,
        ));
        let rooms = self.chat.auto_subscribe(session_id, user_id).await;
        TestSession {
            session_id: session_id.to_string(),
            user_id,
            rooms,
            events: events_rx,
            control: control_rx,
        }
    }
}

pub struct TestSession {
    pub session_id: String,
    pub user_id: i64,
    pub rooms: Vec<i64>,
    pub events: mpsc::Receiver<OutboundEvent>,
    pub control: mpsc::UnboundedReceiver<SessionControl>,
}

impl TestSession {
    /// Next queued event, failing the test if none arrives in time.
    pub async fn next_event(&mut self) -> OutboundEvent {
        tokio::time::timeout(std::time::Duration::from_secs(1), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Next queued message event, skipping presence and typing noise.
    pub async fn next_message(&mut self) -> roomchat::domain::entities::Message {
        loop {
            match self.next_event().await {
                OutboundEvent::Message(m) => return m,
                OutboundEvent::Typing { .. } | OutboundEvent::Presence { .. } => continue,
                other => panic!("expected message, got {:?}", other),
            }
        }
    }

    /// Assert nothing else is queued.
    pub fn assert_no_event(&mut self) {
        if let Ok(event) = self.events.try_recv() {
            panic!("unexpected event: {:?}", event);
        }
    }

    /// Drain whatever is queued right now.
    pub fn drain(&mut self) {
        while self.events.try_recv().is_ok() {}
    }

    /// The pending force-close control signal, if any.
    pub fn take_force_close(&mut self) -> Option<SessionControl> {
        self.control.try_recv().ok()
    }
}
