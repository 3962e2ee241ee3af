use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::project;
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /                  -> list
/// POST   /                  -> create
/// GET    /tree              -> tree
/// GET    /{id}              -> get_by_id
/// PATCH  /{id}              -> update
/// DELETE /{id}              -> delete
/// PATCH  /{id}/parent       -> move_parent
/// POST   /{id}/archive      -> archive
/// POST   /{id}/unarchive    -> unarchive
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(project::list).post(project::create))
        .route("/tree", get(project::tree))
        .route(
            "/{id}",
            get(project::get_by_id)
                .patch(project::update)
                .delete(project::delete),
        )
        .route("/{id}/parent", patch(project::move_parent))
        .route("/{id}/archive", post(project::archive))
        .route("/{id}/unarchive", post(project::unarchive))
}
