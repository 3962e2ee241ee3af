//! Batch token redemption.
//!
//! A batch token is consumed exactly like a single token. Its items are
//! then restored newest first through the same path as a single undo.
//! Restoration is best-effort per item: a failing item is reported and the
//! rest still run. Items already restored are not rolled back.

use serde::Serialize;
use todo_core::error::CoreError;
use todo_core::token::BatchUndoToken;
use todo_core::types::DbId;
use todo_core::undo::{
    batch_key, is_batch_token, is_well_formed_token, log_prefix, ActionKind, EntityType,
};
use todo_events::PlatformEvent;

use crate::coordinator::UndoCoordinator;
use crate::error::UndoError;
use crate::references::DiscardedReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Restored,
    /// Restored, but at least one reference was dropped.
    ReferenceDiscarded,
    EntityGone,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub action_kind: ActionKind,
    pub status: BatchItemStatus,
    pub discarded: Vec<DiscardedReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-item outcome of a batch undo, in the order items were restored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRestoreResult {
    pub items: Vec<BatchItemResult>,
    pub restored_count: usize,
    pub failed_count: usize,
}

impl UndoCoordinator {
    /// Redeem a batch token for `owner_id`.
    pub async fn redeem_batch(
        &self,
        owner_id: DbId,
        token: &str,
    ) -> Result<BatchRestoreResult, UndoError> {
        if !is_batch_token(token) || !is_well_formed_token(token) {
            return Err(UndoError::TokenNotFoundOrExpired);
        }

        let raw = self
            .consume(&batch_key(owner_id, token))
            .await?
            .ok_or(UndoError::TokenNotFoundOrExpired)?;

        let record: BatchUndoToken = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Internal(format!("Corrupt batch undo token payload: {e}"))
        })?;

        if record.owner_id != owner_id || record.is_expired(self.now()) {
            return Err(UndoError::TokenNotFoundOrExpired);
        }

        let mut items = Vec::with_capacity(record.items.len());
        for item in record.restore_order() {
            let result = self
                .restore_item(
                    owner_id,
                    item.entity_type,
                    item.entity_id,
                    item.action_kind,
                    &item.snapshot,
                )
                .await;

            let (status, discarded, message) = match result {
                Ok(outcome) if outcome.discarded.is_empty() => {
                    (BatchItemStatus::Restored, Vec::new(), None)
                }
                Ok(outcome) => (BatchItemStatus::ReferenceDiscarded, outcome.discarded, None),
                Err(e @ UndoError::EntityGone { .. }) => {
                    (BatchItemStatus::EntityGone, Vec::new(), Some(e.to_string()))
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = owner_id,
                        token = log_prefix(token),
                        entity_type = %item.entity_type,
                        entity_id = item.entity_id,
                        error = %e,
                        "Batch undo item failed"
                    );
                    (BatchItemStatus::Failed, Vec::new(), Some(e.to_string()))
                }
            };

            items.push(BatchItemResult {
                entity_type: item.entity_type,
                entity_id: item.entity_id,
                action_kind: item.action_kind,
                status,
                discarded,
                message,
            });
        }

        let restored_count = items
            .iter()
            .filter(|i| {
                matches!(
                    i.status,
                    BatchItemStatus::Restored | BatchItemStatus::ReferenceDiscarded
                )
            })
            .count();
        let failed_count = items.len() - restored_count;

        if restored_count > 0 {
            self.events
                .publish(PlatformEvent::batch_invalidation(owner_id, restored_count));
        }

        tracing::info!(
            user_id = owner_id,
            token = log_prefix(token),
            restored = restored_count,
            failed = failed_count,
            "Batch undo applied"
        );

        Ok(BatchRestoreResult {
            items,
            restored_count,
            failed_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use todo_core::token::BatchItem;
    use todo_db::models::status::TaskStatus;
    use todo_db::models::task::{CreateTask, Task};

    use super::*;
    use crate::gateway::EntityGateway;
    use crate::snapshot::task::TaskField;
    use crate::snapshot::StateSnapshot;
    use crate::testing::{Harness, OTHER, OWNER};

    async fn task(h: &Harness, title: &str) -> Task {
        h.gateway
            .create_task(
                OWNER,
                &CreateTask {
                    title: title.into(),
                    description: None,
                    priority: None,
                    due_date: None,
                    project_id: None,
                    tag_ids: Vec::new(),
                },
            )
            .await
            .unwrap()
    }

    /// Set `status` on `task` and return the batch item recording the change.
    async fn set_status(h: &Harness, task: &Task, status: TaskStatus) -> (Task, BatchItem) {
        let item = BatchItem {
            entity_type: EntityType::Task,
            entity_id: task.id,
            action_kind: ActionKind::StatusChange,
            snapshot: task.capture_state(&[TaskField::Status]),
        };
        let mut updated = task.clone();
        updated.status = status;
        updated.completed_at = (status == TaskStatus::Completed).then(chrono::Utc::now);
        let saved = h.gateway.save_task(&updated).await.unwrap().unwrap();
        (saved, item)
    }

    #[tokio::test]
    async fn batch_restores_every_item() {
        let h = Harness::new();
        let mut batch = Vec::new();
        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            let t = task(&h, title).await;
            ids.push(t.id);
            batch.push(set_status(&h, &t, TaskStatus::Completed).await.1);
        }
        let token = h.issuer.issue_batch(OWNER, batch).await.unwrap().undo_token;

        let result = h.coordinator.redeem_batch(OWNER, &token).await.unwrap();
        assert_eq!(result.restored_count, 3);
        assert_eq!(result.failed_count, 0);

        let restored_order: Vec<DbId> = result.items.iter().map(|i| i.entity_id).collect();
        ids.reverse();
        assert_eq!(restored_order, ids);

        for id in ids {
            let t = h.gateway.find_task(OWNER, id).await.unwrap().unwrap();
            assert_eq!(t.status, TaskStatus::Pending);
        }
    }

    #[tokio::test]
    async fn items_are_restored_newest_first() {
        let h = Harness::new();
        let t = task(&h, "a").await;
        let (t, first) = set_status(&h, &t, TaskStatus::Completed).await;
        let (_, second) = set_status(&h, &t, TaskStatus::InProgress).await;
        let token = h
            .issuer
            .issue_batch(OWNER, vec![first, second])
            .await
            .unwrap()
            .undo_token;

        h.coordinator.redeem_batch(OWNER, &token).await.unwrap();

        let back = h.gateway.find_task(OWNER, t.id).await.unwrap().unwrap();
        assert_eq!(back.status, TaskStatus::Pending);
        assert_eq!(back.completed_at, None);
    }

    #[tokio::test]
    async fn one_gone_item_does_not_stop_the_rest() {
        let h = Harness::new();
        let a = task(&h, "a").await;
        let b = task(&h, "b").await;
        let item_a = set_status(&h, &a, TaskStatus::Completed).await.1;
        let item_b = set_status(&h, &b, TaskStatus::Completed).await.1;
        let token = h
            .issuer
            .issue_batch(OWNER, vec![item_a, item_b])
            .await
            .unwrap()
            .undo_token;

        h.gateway.delete_task(OWNER, b.id).await.unwrap();

        let result = h.coordinator.redeem_batch(OWNER, &token).await.unwrap();
        assert_eq!(result.restored_count, 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.items[0].entity_id, b.id);
        assert_eq!(result.items[0].status, BatchItemStatus::EntityGone);
        assert_eq!(result.items[1].status, BatchItemStatus::Restored);

        let back = h.gateway.find_task(OWNER, a.id).await.unwrap().unwrap();
        assert_eq!(back.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn discarded_reference_is_reported_per_item() {
        let h = Harness::new();
        let t = task(&h, "a").await;
        let item = BatchItem {
            entity_type: EntityType::Task,
            entity_id: t.id,
            action_kind: ActionKind::Move,
            snapshot: todo_core::snapshot::Snapshot::new().with("projectId", 9999),
        };
        let token = h.issuer.issue_batch(OWNER, vec![item]).await.unwrap().undo_token;

        let result = h.coordinator.redeem_batch(OWNER, &token).await.unwrap();
        assert_eq!(result.items[0].status, BatchItemStatus::ReferenceDiscarded);
        assert_eq!(result.items[0].discarded[0].reference_id, 9999);
        assert_eq!(result.restored_count, 1);
    }

    #[tokio::test]
    async fn batch_token_is_single_use_and_owner_scoped() {
        let h = Harness::new();
        let t = task(&h, "a").await;
        let item = set_status(&h, &t, TaskStatus::Completed).await.1;
        let token = h.issuer.issue_batch(OWNER, vec![item]).await.unwrap().undo_token;

        assert_matches!(
            h.coordinator.redeem_batch(OTHER, &token).await,
            Err(UndoError::TokenNotFoundOrExpired)
        );
        assert!(h.coordinator.redeem_batch(OWNER, &token).await.is_ok());
        assert_matches!(
            h.coordinator.redeem_batch(OWNER, &token).await,
            Err(UndoError::TokenNotFoundOrExpired)
        );
    }

    #[tokio::test]
    async fn expired_batch_is_rejected() {
        let h = Harness::new();
        let t = task(&h, "a").await;
        let item = set_status(&h, &t, TaskStatus::Completed).await.1;
        let token = h.issuer.issue_batch(OWNER, vec![item]).await.unwrap().undo_token;

        h.advance_clock(60);
        assert_matches!(
            h.coordinator.redeem_batch(OWNER, &token).await,
            Err(UndoError::TokenNotFoundOrExpired)
        );
    }

    #[tokio::test]
    async fn single_token_is_not_a_batch_token() {
        let h = Harness::new();
        let token = todo_core::undo::generate_token();
        assert_matches!(
            h.coordinator.redeem_batch(OWNER, &token).await,
            Err(UndoError::TokenNotFoundOrExpired)
        );
    }

    #[tokio::test]
    async fn one_invalidation_per_batch() {
        let h = Harness::new();
        let mut rx = h.events.subscribe();
        let a = task(&h, "a").await;
        let b = task(&h, "b").await;
        let items = vec![
            set_status(&h, &a, TaskStatus::Completed).await.1,
            set_status(&h, &b, TaskStatus::Completed).await.1,
        ];
        let token = h.issuer.issue_batch(OWNER, items).await.unwrap().undo_token;

        h.coordinator.redeem_batch(OWNER, &token).await.unwrap();

        assert_eq!(rx.try_recv().unwrap().invalidated_owner(), Some(OWNER));
        assert!(rx.try_recv().is_err());
    }
}
