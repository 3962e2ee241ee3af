//! Token redemption.
//!
//! Redemption is a single atomic consume followed by restoration. There is
//! no validity check ahead of the consume: the get-and-delete *is* the
//! check, so two concurrent redeemers can never both proceed.

use std::sync::Arc;

use serde::Serialize;
use todo_core::error::CoreError;
use todo_core::snapshot::Snapshot;
use todo_core::token::UndoToken;
use todo_core::types::{DbId, Timestamp};
use todo_core::undo::{
    is_batch_token, is_well_formed_token, log_prefix, single_key, ActionKind, EntityType,
};
use todo_db::models::project::Project;
use todo_db::models::task::Task;
use todo_events::{EventBus, PlatformEvent};

use crate::config::UndoConfig;
use crate::error::UndoError;
use crate::gateway::EntityGateway;
use crate::references::{authorize_project_restores, authorize_task_restores, DiscardedReference};
use crate::snapshot::project::project_shell;
use crate::snapshot::task::task_shell;
use crate::snapshot::StateSnapshot;
use crate::store::{bounded, TokenStore};
use crate::Clock;

/// What a successful redemption did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub action_kind: ActionKind,
    /// The record as it stands after restoration; `None` when the undo
    /// removed it (undo of a create).
    pub entity: Option<serde_json::Value>,
    pub discarded: Vec<DiscardedReference>,
}

pub struct UndoCoordinator {
    pub(crate) store: Arc<dyn TokenStore>,
    pub(crate) gateway: Arc<dyn EntityGateway>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) config: UndoConfig,
    pub(crate) clock: Clock,
}

impl UndoCoordinator {
    pub fn new(
        store: Arc<dyn TokenStore>,
        gateway: Arc<dyn EntityGateway>,
        events: Arc<EventBus>,
        config: UndoConfig,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            config,
            clock,
        }
    }

    /// Atomically consume `key`. A store failure or timeout fails closed.
    pub(crate) async fn consume(&self, key: &str) -> Result<Option<String>, UndoError> {
        Ok(bounded(self.config.store_timeout, self.store.take(key)).await?)
    }

    pub(crate) fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Redeem a single-operation token for `owner_id`.
    ///
    /// `expected` narrows the token to one entity type; a token of another
    /// type is consumed and reported as not found.
    pub async fn redeem(
        &self,
        owner_id: DbId,
        token: &str,
        expected: Option<EntityType>,
    ) -> Result<RestoreOutcome, UndoError> {
        if is_batch_token(token) || !is_well_formed_token(token) {
            return Err(UndoError::TokenNotFoundOrExpired);
        }

        let raw = self
            .consume(&single_key(owner_id, token))
            .await?
            .ok_or(UndoError::TokenNotFoundOrExpired)?;

        let record: UndoToken = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Internal(format!("Corrupt undo token payload: {e}"))
        })?;

        if record.owner_id != owner_id || record.is_expired(self.now()) {
            return Err(UndoError::TokenNotFoundOrExpired);
        }
        if expected.is_some_and(|t| t != record.entity_type) {
            tracing::debug!(
                user_id = owner_id,
                token = log_prefix(token),
                entity_type = %record.entity_type,
                "Undo token redeemed against the wrong entity type"
            );
            return Err(UndoError::TokenNotFoundOrExpired);
        }

        let outcome = self
            .restore_item(
                owner_id,
                record.entity_type,
                record.entity_id,
                record.action_kind,
                &record.snapshot,
            )
            .await?;

        self.invalidate(owner_id, outcome.entity_type, outcome.entity_id);

        tracing::info!(
            user_id = owner_id,
            token = log_prefix(token),
            action = %outcome.action_kind,
            entity_type = %outcome.entity_type,
            entity_id = outcome.entity_id,
            discarded = outcome.discarded.len(),
            "Undo applied"
        );

        Ok(outcome)
    }

    pub(crate) fn invalidate(&self, owner_id: DbId, entity_type: EntityType, entity_id: DbId) {
        self.events.publish(PlatformEvent::cache_invalidation(
            owner_id,
            entity_type.as_str(),
            entity_id,
        ));
    }

    /// Reverse one recorded operation. Shared by single and batch redemption.
    pub(crate) async fn restore_item(
        &self,
        owner_id: DbId,
        entity_type: EntityType,
        entity_id: DbId,
        action_kind: ActionKind,
        snapshot: &Snapshot,
    ) -> Result<RestoreOutcome, UndoError> {
        let (entity, discarded) = match entity_type {
            EntityType::Task => {
                self.restore_task(owner_id, entity_id, action_kind, snapshot)
                    .await?
            }
            EntityType::Project => {
                self.restore_project(owner_id, entity_id, action_kind, snapshot)
                    .await?
            }
        };
        Ok(RestoreOutcome {
            entity_type,
            entity_id,
            action_kind,
            entity,
            discarded,
        })
    }

    async fn restore_task(
        &self,
        owner_id: DbId,
        id: DbId,
        action_kind: ActionKind,
        snapshot: &Snapshot,
    ) -> Result<(Option<serde_json::Value>, Vec<DiscardedReference>), UndoError> {
        let gone = || UndoError::EntityGone {
            entity_type: EntityType::Task,
            entity_id: id,
        };
        let now = self.now();

        match action_kind {
            ActionKind::Create => {
                if !self.gateway.delete_task(owner_id, id).await? {
                    return Err(gone());
                }
                Ok((None, Vec::new()))
            }
            ActionKind::Delete => {
                let mut task = task_shell(owner_id, id, snapshot, now)?;
                let restores = Task::decode_state(snapshot)?;
                let authorized = authorize_task_restores(&*self.gateway, owner_id, restores).await?;
                task.apply_state(authorized.restores, now);
                let task = self.gateway.insert_task(&task).await?.ok_or_else(|| {
                    CoreError::Conflict(format!("Task {id} already exists"))
                })?;
                Ok((Some(to_json(&task)?), authorized.discarded))
            }
            _ => {
                let mut task = self
                    .gateway
                    .find_task(owner_id, id)
                    .await?
                    .ok_or_else(gone)?;
                let restores = Task::decode_state(snapshot)?;
                let authorized = authorize_task_restores(&*self.gateway, owner_id, restores).await?;
                task.apply_state(authorized.restores, now);
                let task = self.gateway.save_task(&task).await?.ok_or_else(gone)?;
                Ok((Some(to_json(&task)?), authorized.discarded))
            }
        }
    }

    async fn restore_project(
        &self,
        owner_id: DbId,
        id: DbId,
        action_kind: ActionKind,
        snapshot: &Snapshot,
    ) -> Result<(Option<serde_json::Value>, Vec<DiscardedReference>), UndoError> {
        let gone = || UndoError::EntityGone {
            entity_type: EntityType::Project,
            entity_id: id,
        };
        let now = self.now();

        match action_kind {
            ActionKind::Create => {
                if !self.gateway.delete_project(owner_id, id).await? {
                    return Err(gone());
                }
                Ok((None, Vec::new()))
            }
            ActionKind::Delete => {
                let mut project = project_shell(owner_id, id, snapshot, now)?;
                let restores = Project::decode_state(snapshot)?;
                let authorized =
                    authorize_project_restores(&*self.gateway, owner_id, id, restores).await?;
                project.apply_state(authorized.restores, now);
                let project = self.gateway.insert_project(&project).await?.ok_or_else(|| {
                    CoreError::Conflict(format!("Project {id} already exists"))
                })?;
                Ok((Some(to_json(&project)?), authorized.discarded))
            }
            _ => {
                let mut project = self
                    .gateway
                    .find_project(owner_id, id)
                    .await?
                    .ok_or_else(gone)?;
                let restores = Project::decode_state(snapshot)?;
                let authorized =
                    authorize_project_restores(&*self.gateway, owner_id, id, restores).await?;
                project.apply_state(authorized.restores, now);
                let project = self.gateway.save_project(&project).await?.ok_or_else(gone)?;
                Ok((Some(to_json(&project)?), authorized.discarded))
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, CoreError> {
    serde_json::to_value(value).map_err(|e| CoreError::Internal(e.to_string()))
}
