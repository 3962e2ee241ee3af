pub mod batch;
pub mod health;
pub mod project;
pub mod tag;
pub mod task;
pub mod undo;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /tasks                          list, create
/// /tasks/{id}                     get, update, delete
/// /tasks/{id}/status              status change
/// /tasks/{id}/position            reorder
///
/// /projects                       list, create
/// /projects/tree                  cached hierarchy
/// /projects/{id}                  get, update, delete
/// /projects/{id}/parent           move
/// /projects/{id}/archive          archive
/// /projects/{id}/unarchive        unarchive
///
/// /tags                           list, create
///
/// /batch                          bulk task operation
/// /undo/{token}                   redeem an undo token
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tasks", task::router())
        .nest("/projects", project::router())
        .nest("/tags", tag::router())
        .nest("/batch", batch::router())
        .nest("/undo", undo::router())
}
