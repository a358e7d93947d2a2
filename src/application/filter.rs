//! Enforcement filter.
//!
//! Every inbound action passes through here before it can touch the
//! broadcast bus or the persistence sink. The filter gathers standing
//! sanction state from the store and applies the resolution order from
//! the domain rules.

use std::sync::Arc;

use crate::domain::entities::{SanctionStatus, Scope};
use crate::domain::services::enforcement::{self, ActionKind, DenyReason};

use super::sanctions::SanctionStore;

/// Sanction-aware gate for inbound actions.
pub struct EnforcementFilter {
    sanctions: Arc<SanctionStore>,
}

impl EnforcementFilter {
    pub fn new(sanctions: Arc<SanctionStore>) -> Self {
        Self { sanctions }
    }

    /// Gate a room-scoped action.
    pub fn check(&self, user_id: i64, room_id: i64, action: ActionKind) -> Result<(), DenyReason> {
        let (global, room) = self.sanctions.combined_status(user_id, room_id);
        let rejoin_blocked = match action {
            ActionKind::Join => self.sanctions.is_rejoin_blocked(user_id, room_id),
            _ => false,
        };
        let decision = enforcement::resolve(global, room, rejoin_blocked, action);
        if let Err(reason) = &decision {
            tracing::debug!(user_id, room_id, reason = reason.code(), "Action denied");
        }
        decision
    }

    /// Gate the authentication handshake: only a global ban blocks it.
    pub fn check_connect(&self, user_id: i64) -> Result<(), DenyReason> {
        if self.sanctions.status_for(user_id, Scope::Global) == SanctionStatus::Banned {
            return Err(DenyReason::Banned);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::SanctionKind;
    use crate::infrastructure::persistence::memory::InMemorySink;
    use crate::shared::snowflake::SnowflakeGenerator;

    fn filter() -> (EnforcementFilter, Arc<SanctionStore>) {
        let sink = Arc::new(InMemorySink::new());
        let ids = Arc::new(SnowflakeGenerator::new(1, 1));
        let store = Arc::new(SanctionStore::new(sink, ids));
        (EnforcementFilter::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_clean_user_passes_all_actions() {
        let (filter, _store) = filter();
        assert!(filter.check(5, 10, ActionKind::Send).is_ok());
        assert!(filter.check(5, 10, ActionKind::Typing).is_ok());
        assert!(filter.check(5, 10, ActionKind::Join).is_ok());
        assert!(filter.check_connect(5).is_ok());
    }

    #[tokio::test]
    async fn test_global_ban_blocks_connect_and_everything() {
        let (filter, store) = filter();
        store
            .issue(SanctionKind::Ban, Scope::Global, 5, 1, "".into(), None)
            .await
            .unwrap();

        assert_eq!(filter.check_connect(5), Err(DenyReason::Banned));
        assert_eq!(filter.check(5, 10, ActionKind::Send), Err(DenyReason::Banned));
        assert_eq!(filter.check(5, 99, ActionKind::Join), Err(DenyReason::Banned));
    }

    #[tokio::test]
    async fn test_room_mute_blocks_send_only() {
        let (filter, store) = filter();
        store
            .issue(SanctionKind::Mute, Scope::Room(10), 5, 1, "".into(), None)
            .await
            .unwrap();

        assert_eq!(filter.check(5, 10, ActionKind::Send), Err(DenyReason::Muted));
        assert!(filter.check(5, 10, ActionKind::Typing).is_ok());
        assert!(filter.check(5, 11, ActionKind::Send).is_ok());
        assert!(filter.check_connect(5).is_ok());
    }

    #[tokio::test]
    async fn test_kick_blocks_join_in_kicked_room_only() {
        let (filter, store) = filter();
        let soon = chrono::Utc::now() + chrono::Duration::seconds(60);
        store
            .issue(SanctionKind::Kick, Scope::Room(10), 5, 1, "".into(), Some(soon))
            .await
            .unwrap();

        assert_eq!(filter.check(5, 10, ActionKind::Join), Err(DenyReason::Kicked));
        assert!(filter.check(5, 11, ActionKind::Join).is_ok());
    }
}
