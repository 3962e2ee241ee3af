use axum::routing::get;
use axum::Router;

use crate::handlers::tag;
use crate::state::AppState;

/// Routes mounted at `/tags`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(tag::list).post(tag::create))
}
