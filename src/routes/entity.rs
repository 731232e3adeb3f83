//! Generic table routes. The path segment names a registry table; handlers resolve it.

use crate::handlers::entity::{create, delete as delete_handler, list, read, stats, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:table", get(list).post(create))
        .route("/:table/stats", get(stats))
        .route("/:table/:id", get(read).patch(update).delete(delete_handler))
        .with_state(state)
}
