//! Sanction store.
//!
//! Authoritative in-memory record of active sanctions, keyed by
//! (target user, scope). Every mutation is written to the persistence
//! sink before the in-memory state changes; a sink failure aborts the
//! operation. Expiry is lazy: expired records are swept out on the
//! query path, never by a background task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::entities::{Sanction, SanctionKind, SanctionStatus, Scope};
use crate::domain::persistence::PersistenceSink;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Failure modes of sanction mutations.
#[derive(Debug, thiserror::Error)]
pub enum SanctionError {
    #[error("no matching active sanction")]
    NotFound,

    #[error("sanction could not be persisted: {0}")]
    Persistence(#[from] AppError),
}

/// In-memory sanction records backed by the write-only sink.
pub struct SanctionStore {
    sink: Arc<dyn PersistenceSink>,
    ids: Arc<SnowflakeGenerator>,
    /// Active sanctions per (target, scope)
    records: DashMap<(i64, Scope), Vec<Sanction>>,
}

impl SanctionStore {
    pub fn new(sink: Arc<dyn PersistenceSink>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            sink,
            ids,
            records: DashMap::new(),
        }
    }

    /// Issue a sanction. The record is persisted first; only on success
    /// does it become visible to enforcement queries.
    pub async fn issue(
        &self,
        kind: SanctionKind,
        scope: Scope,
        target_id: i64,
        issuer_id: i64,
        reason: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Sanction, SanctionError> {
        let sanction = Sanction {
            id: self.ids.generate(),
            kind,
            scope,
            target_id,
            issuer_id,
            reason,
            issued_at: Utc::now(),
            expires_at,
            active: true,
        };

        self.sink.store_sanction(&sanction).await?;
        self.records
            .entry((target_id, scope))
            .or_default()
            .push(sanction.clone());

        tracing::info!(
            sanction_id = sanction.id,
            kind = kind.as_str(),
            scope = %scope,
            target_id,
            issuer_id,
            "Sanction issued"
        );
        Ok(sanction)
    }

    /// Lift one active sanction by id. The sink is told first; the record
    /// stays enforceable if deactivation cannot be recorded.
    pub async fn lift(
        &self,
        sanction_id: i64,
        target_id: i64,
        scope: Scope,
    ) -> Result<Sanction, SanctionError> {
        let key = (target_id, scope);
        let exists = self
            .records
            .get(&key)
            .map(|v| v.iter().any(|s| s.id == sanction_id))
            .unwrap_or(false);
        if !exists {
            return Err(SanctionError::NotFound);
        }

        self.sink.deactivate_sanction(sanction_id).await?;

        let mut lifted = None;
        if let Some(mut records) = self.records.get_mut(&key) {
            if let Some(pos) = records.iter().position(|s| s.id == sanction_id) {
                lifted = Some(records.remove(pos));
            }
        }
        self.records.remove_if(&key, |_, v| v.is_empty());

        lifted.ok_or(SanctionError::NotFound)
    }

    /// Active sanction ids of one kind for a target in a scope, used to
    /// resolve unmute/unban requests.
    pub fn find_active(&self, target_id: i64, scope: Scope, kind: SanctionKind) -> Vec<i64> {
        let now = Utc::now();
        self.sweep(target_id, scope, now);
        self.records
            .get(&(target_id, scope))
            .map(|v| {
                v.iter()
                    .filter(|s| s.kind == kind)
                    .map(|s| s.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Standing sanction status for a user in one scope. A ban dominates a
    /// mute; kick records never contribute (they only block re-join).
    pub fn status_for(&self, user_id: i64, scope: Scope) -> SanctionStatus {
        let now = Utc::now();
        self.sweep(user_id, scope, now);

        let mut status = SanctionStatus::None;
        if let Some(records) = self.records.get(&(user_id, scope)) {
            for sanction in records.iter() {
                match sanction.kind {
                    SanctionKind::Ban => return SanctionStatus::Banned,
                    SanctionKind::Mute => status = SanctionStatus::Muted,
                    SanctionKind::Kick => {}
                }
            }
        }
        status
    }

    /// Combined status across global and room scope; ban dominates.
    pub fn combined_status(&self, user_id: i64, room_id: i64) -> (SanctionStatus, SanctionStatus) {
        (
            self.status_for(user_id, Scope::Global),
            self.status_for(user_id, Scope::Room(room_id)),
        )
    }

    /// Whether an unexpired kick blocks the user from re-joining a room.
    pub fn is_rejoin_blocked(&self, user_id: i64, room_id: i64) -> bool {
        let scope = Scope::Room(room_id);
        self.sweep(user_id, scope, Utc::now());
        self.records
            .get(&(user_id, scope))
            .map(|v| v.iter().any(|s| s.kind == SanctionKind::Kick))
            .unwrap_or(false)
    }

    /// Drop expired records for one key and tell the sink best-effort.
    /// Enforcement already treats them as inactive, so a sink failure here
    /// only delays the durable deactivation record.
    fn sweep(&self, user_id: i64, scope: Scope, now: DateTime<Utc>) {
        let mut expired = Vec::new();
        if let Some(mut records) = self.records.get_mut(&(user_id, scope)) {
            records.retain(|s| {
                if s.is_expired(now) {
                    expired.push(s.id);
                    false
                } else {
                    true
                }
            });
        }
        self.records.remove_if(&(user_id, scope), |_, v| v.is_empty());

        if expired.is_empty() {
            return;
        }
        let sink = self.sink.clone();
        tokio::spawn(async move {
            for id in expired {
                if let Err(e) = sink.deactivate_sanction(id).await {
                    tracing::warn!(sanction_id = id, error = %e, "Failed to record sanction expiry");
                }
            }
        });
    }

    /// Number of active sanction records, sweeping nothing.
    pub fn active_count(&self) -> usize {
        self.records.iter().map(|v| v.len()).sum()
    }
}
