//! Handlers for the `/tags` resource. Tags are not undoable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use todo_db::models::tag::{CreateTag, Tag};

use super::require_non_blank;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/tags
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateTag>,
) -> AppResult<(StatusCode, Json<DataResponse<Tag>>)> {
    require_non_blank("name", &input.name)?;
    let tag = state.gateway.create_tag(auth.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(tag))))
}

/// GET /api/v1/tags
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Tag>>>> {
    let tags = state.gateway.list_tags(auth.user_id).await?;
    Ok(Json(DataResponse::new(tags)))
}
