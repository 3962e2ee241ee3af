//! Handlers for the `/tasks` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use todo_core::error::CoreError;
use todo_core::snapshot::Snapshot;
use todo_core::types::DbId;
use todo_core::undo::{ActionKind, EntityType};
use todo_db::models::status::TaskStatus;
use todo_db::models::task::{CreateTask, Task, UpdateTask, MAX_PRIORITY, MIN_PRIORITY};
use todo_undo::snapshot::task::TaskField;
use todo_undo::snapshot::StateSnapshot;

use super::{ensure_assignable_project, ensure_owned_tags, record_undo, require_non_blank};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStatus {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetPosition {
    pub position: i32,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: DbId,
}

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound { entity: "Task", id }
}

fn validate_priority(priority: Option<i16>) -> AppResult<()> {
    match priority {
        Some(p) if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&p) => Err(CoreError::Validation(
            format!("priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}"),
        )
        .into()),
        _ => Ok(()),
    }
}

fn normalize_tags(tag_ids: &mut Vec<DbId>) {
    tag_ids.sort_unstable();
    tag_ids.dedup();
}

async fn load(state: &AppState, owner_id: DbId, id: DbId) -> AppResult<Task> {
    Ok(state
        .gateway
        .find_task(owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?)
}

async fn flush(state: &AppState, task: &Task) -> AppResult<Task> {
    Ok(state
        .gateway
        .save_task(task)
        .await?
        .ok_or_else(|| not_found(task.id))?)
}

/// POST /api/v1/tasks
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(mut input): Json<CreateTask>,
) -> AppResult<(StatusCode, Json<DataResponse<Task>>)> {
    let owner_id = auth.user_id;
    require_non_blank("title", &input.title)?;
    validate_priority(input.priority)?;
    normalize_tags(&mut input.tag_ids);
    if let Some(project_id) = input.project_id {
        ensure_assignable_project(&state, owner_id, project_id).await?;
    }
    ensure_owned_tags(&state, owner_id, &input.tag_ids).await?;

    let task = state.gateway.create_task(owner_id, &input).await?;
    tracing::info!(user_id = owner_id, task_id = task.id, "Task created");

    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::Create,
        EntityType::Task,
        task.id,
        Snapshot::new(),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse::with_undo(task, undo))))
}

/// GET /api/v1/tasks
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Task>>>> {
    let tasks = state.gateway.list_tasks(auth.user_id).await?;
    Ok(Json(DataResponse::new(tasks)))
}

/// GET /api/v1/tasks/{id}
pub async fn get_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Task>>> {
    let task = load(&state, auth.user_id, id).await?;
    Ok(Json(DataResponse::new(task)))
}

/// PATCH /api/v1/tasks/{id}
///
/// A patch that only changes `projectId` is recorded as a move.
pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(mut patch): Json<UpdateTask>,
) -> AppResult<Json<DataResponse<Task>>> {
    let owner_id = auth.user_id;
    let mut task = load(&state, owner_id, id).await?;

    let mut fields = Vec::new();
    if let Some(title) = &patch.title {
        require_non_blank("title", title)?;
        fields.push(TaskField::Title);
    }
    if patch.description.is_some() {
        fields.push(TaskField::Description);
    }
    if patch.priority.is_some() {
        validate_priority(patch.priority)?;
        fields.push(TaskField::Priority);
    }
    if patch.due_date.is_some() {
        fields.push(TaskField::DueDate);
    }
    if let Some(project_id) = patch.project_id {
        if let Some(project_id) = project_id {
            ensure_assignable_project(&state, owner_id, project_id).await?;
        }
        fields.push(TaskField::Project);
    }
    if let Some(tag_ids) = patch.tag_ids.as_mut() {
        normalize_tags(tag_ids);
        ensure_owned_tags(&state, owner_id, tag_ids).await?;
        fields.push(TaskField::Tags);
    }
    if fields.is_empty() {
        return Err(CoreError::Validation("No fields to update".into()).into());
    }

    let action_kind = if fields == [TaskField::Project] {
        ActionKind::Move
    } else {
        ActionKind::Update
    };
    let snapshot = task.capture_state(&fields);

    if let Some(title) = patch.title {
        task.title = title;
    }
    if let Some(description) = patch.description {
        task.description = description;
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date;
    }
    if let Some(project_id) = patch.project_id {
        task.project_id = project_id;
    }
    if let Some(tag_ids) = patch.tag_ids {
        task.tag_ids = tag_ids;
    }

    let task = flush(&state, &task).await?;
    let undo = record_undo(&state, owner_id, action_kind, EntityType::Task, id, snapshot).await;
    Ok(Json(DataResponse::with_undo(task, undo)))
}

/// PATCH /api/v1/tasks/{id}/status
pub async fn set_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SetStatus>,
) -> AppResult<Json<DataResponse<Task>>> {
    let owner_id = auth.user_id;
    let mut task = load(&state, owner_id, id).await?;
    if task.status == input.status {
        return Ok(Json(DataResponse::new(task)));
    }

    let snapshot = task.capture_state(&[TaskField::Status]);
    task.status = input.status;
    task.completed_at = (input.status == TaskStatus::Completed).then(chrono::Utc::now);

    let task = flush(&state, &task).await?;
    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::StatusChange,
        EntityType::Task,
        id,
        snapshot,
    )
    .await;
    Ok(Json(DataResponse::with_undo(task, undo)))
}

/// PATCH /api/v1/tasks/{id}/position
pub async fn set_position(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SetPosition>,
) -> AppResult<Json<DataResponse<Task>>> {
    if input.position < 0 {
        return Err(CoreError::Validation("position must not be negative".into()).into());
    }
    let owner_id = auth.user_id;
    let mut task = load(&state, owner_id, id).await?;

    let snapshot = task.capture_state(&[TaskField::Position]);
    task.position = input.position;

    let task = flush(&state, &task).await?;
    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::Reorder,
        EntityType::Task,
        id,
        snapshot,
    )
    .await;
    Ok(Json(DataResponse::with_undo(task, undo)))
}

/// DELETE /api/v1/tasks/{id}
///
/// Hard delete. The full record is captured so undo can re-create it.
pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Deleted>>> {
    let owner_id = auth.user_id;
    let task = load(&state, owner_id, id).await?;
    let snapshot = task.capture_full_state();

    if !state.gateway.delete_task(owner_id, id).await? {
        return Err(not_found(id).into());
    }
    tracing::info!(user_id = owner_id, task_id = id, "Task deleted");

    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::Delete,
        EntityType::Task,
        id,
        snapshot,
    )
    .await;
    Ok(Json(DataResponse::with_undo(Deleted { id }, undo)))
}
