//! Handler for `POST /undo/{token}`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use todo_core::undo::{is_batch_token, EntityType};
use todo_undo::{BatchRestoreResult, RestoreOutcome};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UndoQuery {
    /// Expected entity type of a single-operation token.
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UndoResult {
    Single(RestoreOutcome),
    Batch(BatchRestoreResult),
}

/// POST /api/v1/undo/{token}
///
/// Batch tokens are recognised by their prefix. `?type=` only narrows
/// single-operation tokens; a batch may span entity types.
pub async fn redeem(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<UndoQuery>,
) -> AppResult<Json<DataResponse<UndoResult>>> {
    let expected = query
        .entity_type
        .as_deref()
        .map(str::parse::<EntityType>)
        .transpose()?;

    let result = if is_batch_token(&token) {
        UndoResult::Batch(state.coordinator.redeem_batch(auth.user_id, &token).await?)
    } else {
        UndoResult::Single(
            state
                .coordinator
                .redeem(auth.user_id, &token, expected)
                .await?,
        )
    };
    Ok(Json(DataResponse::new(result)))
}
