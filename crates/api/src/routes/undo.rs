use axum::routing::post;
use axum::Router;

use crate::handlers::undo;
use crate::state::AppState;

/// Routes mounted at `/undo`.
///
/// ```text
/// POST /{token}?type=task|project   -> redeem
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{token}", post(undo::redeem))
}
