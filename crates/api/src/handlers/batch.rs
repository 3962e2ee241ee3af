//! Handler for `POST /batch`: one operation over many tasks, undone as a unit.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use todo_core::error::CoreError;
use todo_core::token::BatchItem;
use todo_core::types::DbId;
use todo_core::undo::{ActionKind, EntityType};
use todo_db::models::status::TaskStatus;
use todo_db::models::task::Task;
use todo_events::PlatformEvent;
use todo_undo::snapshot::task::TaskField;
use todo_undo::snapshot::StateSnapshot;

use super::ensure_assignable_project;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOperation {
    Complete,
    Uncomplete,
    Delete,
    Move,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub operation: BatchOperation,
    pub task_ids: Vec<DbId>,
    /// Target of a `move`; `null` or absent detaches the tasks.
    #[serde(default)]
    pub project_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Tasks the operation actually changed, in execution order.
    pub affected_ids: Vec<DbId>,
}

/// POST /api/v1/batch
///
/// Ids the caller does not own are skipped. Tasks already in the target
/// state are left alone and get no undo entry. If the database fails
/// partway, the error carries the ids already changed and a token that
/// reverses them.
pub async fn execute(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<BatchRequest>,
) -> AppResult<Json<DataResponse<BatchSummary>>> {
    let owner_id = auth.user_id;
    let max = state.config.undo.max_batch_size;
    if input.task_ids.is_empty() {
        return Err(CoreError::Validation("taskIds must not be empty".into()).into());
    }
    if input.task_ids.len() > max {
        return Err(CoreError::Validation(format!("At most {max} tasks per batch")).into());
    }
    if let (BatchOperation::Move, Some(project_id)) = (input.operation, input.project_id) {
        ensure_assignable_project(&state, owner_id, project_id).await?;
    }

    let tasks = state.gateway.find_tasks(owner_id, &input.task_ids).await?;
    let mut items = Vec::with_capacity(tasks.len());
    let outcome = apply_all(&state, owner_id, &input, tasks, &mut items).await;

    let affected_ids: Vec<DbId> = items.iter().map(|item| item.entity_id).collect();
    tracing::info!(
        user_id = owner_id,
        operation = ?input.operation,
        requested = input.task_ids.len(),
        affected = affected_ids.len(),
        interrupted = outcome.is_err(),
        "Batch executed"
    );

    // Items applied before a failure stay applied, so they still get
    // invalidation and an undo token.
    let undo = if affected_ids.is_empty() {
        None
    } else {
        state
            .event_bus
            .publish(PlatformEvent::batch_invalidation(owner_id, affected_ids.len()));
        state.issuer.issue_batch(owner_id, items).await
    };

    match outcome {
        Ok(()) => Ok(Json(DataResponse::with_undo(BatchSummary { affected_ids }, undo))),
        Err(cause) => Err(AppError::BatchInterrupted {
            applied: affected_ids,
            undo,
            cause,
        }),
    }
}

/// Apply the operation task by task, recording an undo item for each change.
/// Stops at the first database error.
async fn apply_all(
    state: &AppState,
    owner_id: DbId,
    input: &BatchRequest,
    tasks: Vec<Task>,
    items: &mut Vec<BatchItem>,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now();
    for mut task in tasks {
        let (action_kind, snapshot) = match input.operation {
            BatchOperation::Complete | BatchOperation::Uncomplete => {
                let target = if input.operation == BatchOperation::Complete {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Pending
                };
                if task.status == target {
                    continue;
                }
                let snapshot = task.capture_state(&[TaskField::Status]);
                task.status = target;
                task.completed_at = (target == TaskStatus::Completed).then_some(now);
                if state.gateway.save_task(&task).await?.is_none() {
                    continue;
                }
                (ActionKind::StatusChange, snapshot)
            }
            BatchOperation::Delete => {
                let snapshot = task.capture_full_state();
                if !state.gateway.delete_task(owner_id, task.id).await? {
                    continue;
                }
                (ActionKind::Delete, snapshot)
            }
            BatchOperation::Move => {
                if task.project_id == input.project_id {
                    continue;
                }
                let snapshot = task.capture_state(&[TaskField::Project]);
                task.project_id = input.project_id;
                if state.gateway.save_task(&task).await?.is_none() {
                    continue;
                }
                (ActionKind::Move, snapshot)
            }
        };
        items.push(BatchItem {
            entity_type: EntityType::Task,
            entity_id: task.id,
            action_kind,
            snapshot,
        });
    }
    Ok(())
}
