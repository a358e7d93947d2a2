//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderValue;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::{
    ChatService, EnforcementFilter, ModerationService, NotificationDispatcher, PresenceStore,
    RoomBus, SanctionStore,
};
use crate::config::Settings;
use crate::domain::entities::{IdentityProvider, RoomDirectory};
use crate::domain::persistence::PersistenceSink;
use crate::infrastructure::{JwtIdentityProvider, PgPersistenceSink, PgRoomDirectory};
use crate::presentation::http::routes;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Arc<Settings>,
    pub presence: Arc<PresenceStore>,
    pub bus: Arc<RoomBus>,
    pub sanctions: Arc<SanctionStore>,
    pub filter: Arc<EnforcementFilter>,
    pub chat: Arc<ChatService>,
    pub moderation: Arc<ModerationService>,
    pub notifier: Arc<NotificationDispatcher>,
    pub identity: Arc<dyn IdentityProvider>,
    pub directory: Arc<dyn RoomDirectory>,
}

/// Wire the application core around the given collaborators. Production
/// passes the PostgreSQL implementations; tests pass in-memory ones.
pub fn build_state(
    settings: Settings,
    db: PgPool,
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn RoomDirectory>,
    sink: Arc<dyn PersistenceSink>,
) -> AppState {
    let ids = Arc::new(SnowflakeGenerator::new(
        settings.snowflake.machine_id as u64,
        settings.snowflake.node_id as u64,
    ));

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
        sink,
        notifier.clone(),
        ids,
        settings.moderation.kick_cooldown_secs,
    ));

    AppState {
        db,
        settings: Arc::new(settings),
        presence,
        bus,
        sanctions,
        filter,
        chat,
        moderation,
        notifier,
        identity,
        directory,
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = PgPoolOptions::new()
            .max_connections(settings.database.max_connections)
            .min_connections(settings.database.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                settings.database.acquire_timeout,
            ))
            .connect(&settings.database.url)
            .await?;
        tracing::info!("Database connection pool created");

        let identity: Arc<dyn IdentityProvider> =
            Arc::new(JwtIdentityProvider::new(db.clone(), &settings.jwt.secret));
        let directory: Arc<dyn RoomDirectory> = Arc::new(PgRoomDirectory::new(db.clone()));
        let sink: Arc<dyn PersistenceSink> = Arc::new(PgPersistenceSink::new(db.clone()));

        let cors = create_cors_layer(&settings.cors.allowed_origins);
        let addr: SocketAddr = settings.server_addr().parse()?;

        let state = build_state(settings, db, identity, directory, sink);

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
