use axum::routing::post;
use axum::Router;

use crate::handlers::batch;
use crate::state::AppState;

/// Routes mounted at `/batch`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(batch::execute))
}
