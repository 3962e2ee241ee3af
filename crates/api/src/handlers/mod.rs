//! Request handlers.
//!
//! Every undoable mutation follows the same shape: load the entity through
//! an owner-scoped lookup, validate any reference it is about to gain,
//! capture the fields it is about to change, flush, then call
//! [`record_undo`] to signal caches and mint the token.

pub mod batch;
pub mod project;
pub mod tag;
pub mod task;
pub mod undo;

use todo_core::error::CoreError;
use todo_core::snapshot::Snapshot;
use todo_core::types::DbId;
use todo_core::undo::{ActionKind, EntityType};
use todo_events::PlatformEvent;
use todo_undo::IssuedToken;

use crate::error::AppResult;
use crate::state::AppState;

/// Signal read-side caches and mint an undo token for a flushed mutation.
///
/// A token that cannot be stored does not fail the request; the response
/// simply carries no `meta`.
pub(crate) async fn record_undo(
    state: &AppState,
    owner_id: DbId,
    action_kind: ActionKind,
    entity_type: EntityType,
    entity_id: DbId,
    snapshot: Snapshot,
) -> Option<IssuedToken> {
    state.event_bus.publish(PlatformEvent::cache_invalidation(
        owner_id,
        entity_type.as_str(),
        entity_id,
    ));
    state
        .issuer
        .issue(owner_id, action_kind, entity_type, entity_id, snapshot)
        .await
}

/// A project can be referenced if the caller owns it and it is not archived.
pub(crate) async fn ensure_assignable_project(
    state: &AppState,
    owner_id: DbId,
    project_id: DbId,
) -> AppResult<()> {
    let project = state
        .gateway
        .find_project(owner_id, project_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        })?;
    if project.is_archived {
        return Err(CoreError::Validation(format!("Project {project_id} is archived")).into());
    }
    Ok(())
}

/// Every id in `tag_ids` must be a tag the caller owns.
pub(crate) async fn ensure_owned_tags(
    state: &AppState,
    owner_id: DbId,
    tag_ids: &[DbId],
) -> AppResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let owned = state.gateway.find_owned_tag_ids(owner_id, tag_ids).await?;
    let unknown: Vec<String> = tag_ids
        .iter()
        .filter(|id| !owned.contains(id))
        .map(ToString::to_string)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("Unknown tag ids: {}", unknown.join(", "))).into())
    }
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")).into());
    }
    Ok(())
}
