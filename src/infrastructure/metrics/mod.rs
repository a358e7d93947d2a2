//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket session gauge
//! - Messages published per room counter
//! - Enforcement denial counts by reason
//! - Moderation action counts by kind

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket sessions gauge
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("sessions_active", "Number of active WebSocket sessions").namespace("roomchat"),
    )
    .expect("Failed to create SESSIONS_ACTIVE metric")
});

/// Total accepted and broadcast messages
pub static MESSAGES_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("messages_published_total", "Total accepted messages").namespace("roomchat"),
    )
    .expect("Failed to create MESSAGES_PUBLISHED metric")
});

/// Denied inbound actions by denial reason
pub static EVENTS_DENIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_denied_total", "Denied inbound actions").namespace("roomchat"),
        &["reason"],
    )
    .expect("Failed to create EVENTS_DENIED metric")
});

/// Accepted moderation actions by kind
pub static MODERATION_ACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("moderation_actions_total", "Accepted moderation actions").namespace("roomchat"),
        &["kind"],
    )
    .expect("Failed to create MODERATION_ACTIONS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(SESSIONS_ACTIVE.clone()))
        .expect("Failed to register SESSIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_PUBLISHED.clone()))
        .expect("Failed to register MESSAGES_PUBLISHED");
    registry
        .register(Box::new(EVENTS_DENIED.clone()))
        .expect("Failed to register EVENTS_DENIED");
    registry
        .register(Box::new(MODERATION_ACTIONS.clone()))
        .expect("Failed to register MODERATION_ACTIONS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}

/// Helper to record an enforcement denial
pub fn record_denial(reason: &str) {
    EVENTS_DENIED.with_label_values(&[reason]).inc();
}

/// Helper to record an accepted moderation action
pub fn record_moderation(kind: &str) {
    MODERATION_ACTIONS.with_label_values(&[kind]).inc();
}
