pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /execute                 run a snippet (POST)
/// /languages               list registered runners
/// /languages/{language}    look up one runner by name or alias
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/execute", post(handlers::execution::execute_code))
        .route("/languages", get(handlers::execution::list_languages))
        .route(
            "/languages/{language}",
            get(handlers::execution::get_language),
        )
}
