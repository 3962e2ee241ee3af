//! Handlers for the `/projects` resource.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use todo_core::error::CoreError;
use todo_core::snapshot::Snapshot;
use todo_core::types::DbId;
use todo_core::undo::{ActionKind, EntityType};
use todo_db::models::project::{CreateProject, MoveProject, Project, UpdateProject};
use todo_undo::snapshot::project::ProjectField;
use todo_undo::snapshot::StateSnapshot;

use super::task::Deleted;
use super::{ensure_assignable_project, record_undo, require_non_blank};
use crate::cache::{build_tree, Lookup, ProjectNode};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Project",
        id,
    }
}

async fn load(state: &AppState, owner_id: DbId, id: DbId) -> AppResult<Project> {
    Ok(state
        .gateway
        .find_project(owner_id, id)
        .await?
        .ok_or_else(|| not_found(id))?)
}

async fn flush(state: &AppState, project: &Project) -> AppResult<Project> {
    Ok(state
        .gateway
        .save_project(project)
        .await?
        .ok_or_else(|| not_found(project.id))?)
}

/// POST /api/v1/projects
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<DataResponse<Project>>)> {
    let owner_id = auth.user_id;
    require_non_blank("name", &input.name)?;
    if let Some(parent_id) = input.parent_id {
        ensure_assignable_project(&state, owner_id, parent_id).await?;
    }

    let project = state.gateway.create_project(owner_id, &input).await?;
    tracing::info!(user_id = owner_id, project_id = project.id, "Project created");

    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::Create,
        EntityType::Project,
        project.id,
        Snapshot::new(),
    )
    .await;
    Ok((StatusCode::CREATED, Json(DataResponse::with_undo(project, undo))))
}

/// GET /api/v1/projects
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Project>>>> {
    let projects = state.gateway.list_projects(auth.user_id).await?;
    Ok(Json(DataResponse::new(projects)))
}

/// GET /api/v1/projects/tree
///
/// Served from [`crate::cache::ProjectTreeCache`] when the owner's entry is
/// still valid.
pub async fn tree(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ProjectNode>>>> {
    let owner_id = auth.user_id;
    let seen = match state.tree_cache.get(owner_id) {
        Lookup::Hit(tree) => return Ok(Json(DataResponse::new(tree.as_ref().clone()))),
        Lookup::Miss(seen) => seen,
    };

    let tree = build_tree(state.gateway.list_projects(owner_id).await?);
    state.tree_cache.insert(owner_id, seen, Arc::new(tree.clone()));
    Ok(Json(DataResponse::new(tree)))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Project>>> {
    let project = load(&state, auth.user_id, id).await?;
    Ok(Json(DataResponse::new(project)))
}

/// PATCH /api/v1/projects/{id}
pub async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(patch): Json<UpdateProject>,
) -> AppResult<Json<DataResponse<Project>>> {
    let owner_id = auth.user_id;
    let mut project = load(&state, owner_id, id).await?;

    let mut fields = Vec::new();
    if let Some(name) = &patch.name {
        require_non_blank("name", name)?;
        fields.push(ProjectField::Name);
    }
    if patch.description.is_some() {
        fields.push(ProjectField::Description);
    }
    if fields.is_empty() {
        return Err(CoreError::Validation("No fields to update".into()).into());
    }

    let snapshot = project.capture_state(&fields);
    if let Some(name) = patch.name {
        project.name = name;
    }
    if let Some(description) = patch.description {
        project.description = description;
    }

    let project = flush(&state, &project).await?;
    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::Update,
        EntityType::Project,
        id,
        snapshot,
    )
    .await;
    Ok(Json(DataResponse::with_undo(project, undo)))
}

/// PATCH /api/v1/projects/{id}/parent
///
/// `parentId: null` moves the project to the root.
pub async fn move_parent(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<MoveProject>,
) -> AppResult<Json<DataResponse<Project>>> {
    let owner_id = auth.user_id;
    let mut project = load(&state, owner_id, id).await?;

    if let Some(parent_id) = input.parent_id {
        if parent_id == id {
            return Err(CoreError::Validation("A project cannot be its own parent".into()).into());
        }
        ensure_assignable_project(&state, owner_id, parent_id).await?;
        if state
            .gateway
            .project_chain_contains(owner_id, parent_id, id)
            .await?
        {
            return Err(CoreError::Validation(format!(
                "Project {parent_id} is nested under project {id}"
            ))
            .into());
        }
    }

    let snapshot = project.capture_state(&[ProjectField::Parent]);
    project.parent_id = input.parent_id;

    let project = flush(&state, &project).await?;
    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::Move,
        EntityType::Project,
        id,
        snapshot,
    )
    .await;
    Ok(Json(DataResponse::with_undo(project, undo)))
}

async fn set_archived(
    state: &AppState,
    owner_id: DbId,
    id: DbId,
    archived: bool,
) -> AppResult<Json<DataResponse<Project>>> {
    let mut project = load(state, owner_id, id).await?;
    if project.is_archived == archived {
        return Ok(Json(DataResponse::new(project)));
    }

    let snapshot = project.capture_state(&[ProjectField::Archived]);
    project.is_archived = archived;
    project.archived_at = archived.then(chrono::Utc::now);

    let project = flush(state, &project).await?;
    let undo = record_undo(
        state,
        owner_id,
        ActionKind::Archive,
        EntityType::Project,
        id,
        snapshot,
    )
    .await;
    Ok(Json(DataResponse::with_undo(project, undo)))
}

/// POST /api/v1/projects/{id}/archive
pub async fn archive(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Project>>> {
    set_archived(&state, auth.user_id, id, true).await
}

/// POST /api/v1/projects/{id}/unarchive
pub async fn unarchive(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Project>>> {
    set_archived(&state, auth.user_id, id, false).await
}

/// DELETE /api/v1/projects/{id}
///
/// Child projects and tasks are detached, not deleted. Undo re-creates the
/// project itself; the detached rows stay where they are.
pub async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Deleted>>> {
    let owner_id = auth.user_id;
    let project = load(&state, owner_id, id).await?;
    let snapshot = project.capture_full_state();

    if !state.gateway.delete_project(owner_id, id).await? {
        return Err(not_found(id).into());
    }
    tracing::info!(user_id = owner_id, project_id = id, "Project deleted");

    let undo = record_undo(
        &state,
        owner_id,
        ActionKind::Delete,
        EntityType::Project,
        id,
        snapshot,
    )
    .await;
    Ok(Json(DataResponse::with_undo(Deleted { id }, undo)))
}
