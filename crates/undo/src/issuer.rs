//! Token issuance.
//!
//! Called by entity services after a mutation has been flushed. The
//! snapshot handed in was captured before the write. Issuance never fails
//! the mutation: if the store is unreachable the mutation stands and no
//! token is returned.

use std::sync::Arc;

use serde::Serialize;
use todo_core::snapshot::Snapshot;
use todo_core::token::{BatchItem, BatchUndoToken, UndoToken};
use todo_core::types::DbId;
use todo_core::undo::{
    batch_key, generate_batch_token, generate_token, log_prefix, single_key, ActionKind,
    EntityType, DEFAULT_TTL_SECS,
};

use crate::config::UndoConfig;
use crate::store::{bounded, StoreError, TokenStore};
use crate::Clock;

/// What the client receives alongside a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub undo_token: String,
    /// Seconds until the token lapses.
    pub undo_expires_in: u64,
}

#[derive(Clone)]
pub struct UndoIssuer {
    store: Arc<dyn TokenStore>,
    config: UndoConfig,
    clock: Clock,
}

impl UndoIssuer {
    pub fn new(store: Arc<dyn TokenStore>, config: UndoConfig, clock: Clock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_TTL_SECS as i64))
    }

    fn issued(&self, token: String) -> IssuedToken {
        IssuedToken {
            undo_token: token,
            undo_expires_in: self.config.ttl_secs(),
        }
    }

    async fn write(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        bounded(
            self.config.store_timeout,
            self.store.put(key, payload, self.config.ttl),
        )
        .await
    }

    /// Store a single-operation token.
    ///
    /// Returns `None` when the token could not be persisted; the failure is
    /// logged and the caller carries on without an undo affordance.
    pub async fn issue(
        &self,
        owner_id: DbId,
        action_kind: ActionKind,
        entity_type: EntityType,
        entity_id: DbId,
        snapshot: Snapshot,
    ) -> Option<IssuedToken> {
        let token = UndoToken::new(
            generate_token(),
            owner_id,
            action_kind,
            entity_type,
            entity_id,
            snapshot,
            (self.clock)(),
            self.ttl(),
        );

        let payload = match serde_json::to_string(&token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize undo token");
                return None;
            }
        };

        match self.write(&single_key(owner_id, &token.token), &payload).await {
            Ok(()) => {
                tracing::debug!(
                    user_id = owner_id,
                    token = log_prefix(&token.token),
                    action = %action_kind,
                    entity_type = %entity_type,
                    entity_id,
                    "Undo token issued"
                );
                Some(self.issued(token.token))
            }
            Err(e) => {
                tracing::warn!(
                    user_id = owner_id,
                    action = %action_kind,
                    entity_type = %entity_type,
                    entity_id,
                    error = %e,
                    "Undo token not issued"
                );
                None
            }
        }
    }

    /// Store one token covering `items`, given in execution order.
    ///
    /// An empty batch gets no token. A batch larger than the configured
    /// ceiling is refused rather than silently truncated.
    pub async fn issue_batch(&self, owner_id: DbId, items: Vec<BatchItem>) -> Option<IssuedToken> {
        if items.is_empty() {
            return None;
        }
        if items.len() > self.config.max_batch_size {
            tracing::warn!(
                user_id = owner_id,
                items = items.len(),
                max = self.config.max_batch_size,
                "Batch too large for an undo token"
            );
            return None;
        }

        let count = items.len();
        let token = BatchUndoToken::new(
            generate_batch_token(),
            owner_id,
            items,
            (self.clock)(),
            self.ttl(),
        );

        let payload = match serde_json::to_string(&token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize batch undo token");
                return None;
            }
        };

        match self.write(&batch_key(owner_id, &token.token), &payload).await {
            Ok(()) => {
                tracing::debug!(
                    user_id = owner_id,
                    token = log_prefix(&token.token),
                    items = count,
                    "Batch undo token issued"
                );
                Some(self.issued(token.token))
            }
            Err(e) => {
                tracing::warn!(user_id = owner_id, error = %e, "Batch undo token not issued");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use todo_core::undo::{is_batch_token, is_well_formed_token};

    use super::*;
    use crate::store::MemoryTokenStore;
    use crate::system_clock;
    use crate::testing::DownStore;

    fn issuer(store: Arc<dyn TokenStore>) -> UndoIssuer {
        UndoIssuer::new(store, UndoConfig::default(), system_clock())
    }

    fn item(entity_id: DbId) -> BatchItem {
        BatchItem {
            entity_type: EntityType::Task,
            entity_id,
            action_kind: ActionKind::StatusChange,
            snapshot: Snapshot::new().with("status", "pending"),
        }
    }

    #[tokio::test]
    async fn issue_stores_payload_under_owner_key() {
        let store = Arc::new(MemoryTokenStore::new());
        let issued = issuer(store.clone())
            .issue(
                7,
                ActionKind::Update,
                EntityType::Task,
                42,
                Snapshot::new().with("title", "Old"),
            )
            .await
            .unwrap();

        assert!(is_well_formed_token(&issued.undo_token));
        assert_eq!(issued.undo_expires_in, 60);

        let raw = store
            .take(&single_key(7, &issued.undo_token))
            .await
            .unwrap()
            .unwrap();
        let token: UndoToken = serde_json::from_str(&raw).unwrap();
        assert_eq!(token.entity_id, 42);
        assert_eq!(token.owner_id, 7);
        assert_eq!(token.expires_at - token.issued_at, chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let issuer = issuer(Arc::new(MemoryTokenStore::new()));
        let a = issuer
            .issue(1, ActionKind::Create, EntityType::Task, 1, Snapshot::new())
            .await
            .unwrap();
        let b = issuer
            .issue(1, ActionKind::Create, EntityType::Task, 1, Snapshot::new())
            .await
            .unwrap();
        assert_ne!(a.undo_token, b.undo_token);
    }

    #[tokio::test]
    async fn store_failure_yields_no_token() {
        let issued = issuer(Arc::new(DownStore))
            .issue(1, ActionKind::Update, EntityType::Task, 1, Snapshot::new())
            .await;
        assert_eq!(issued, None);
    }

    #[tokio::test]
    async fn batch_token_is_prefixed_and_keyed_separately() {
        let store = Arc::new(MemoryTokenStore::new());
        let issued = issuer(store.clone())
            .issue_batch(3, vec![item(1), item(2)])
            .await
            .unwrap();

        assert!(is_batch_token(&issued.undo_token));
        assert_eq!(store.take(&single_key(3, &issued.undo_token)).await.unwrap(), None);
        assert!(store
            .take(&batch_key(3, &issued.undo_token))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn empty_and_oversized_batches_get_no_token() {
        let store = Arc::new(MemoryTokenStore::new());
        let config = UndoConfig {
            max_batch_size: 2,
            ..UndoConfig::default()
        };
        let issuer = UndoIssuer::new(store.clone(), config, system_clock());

        assert_eq!(issuer.issue_batch(1, Vec::new()).await, None);
        assert_eq!(
            issuer.issue_batch(1, vec![item(1), item(2), item(3)]).await,
            None
        );
        assert!(store.is_empty());
    }

    #[test]
    fn issued_token_serializes_camel_case() {
        let issued = IssuedToken {
            undo_token: "abc".into(),
            undo_expires_in: 60,
        };
        assert_eq!(
            serde_json::to_value(&issued).unwrap(),
            serde_json::json!({"undoToken": "abc", "undoExpiresIn": 60})
        );
    }
}
