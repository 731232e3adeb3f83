//! Router assembly.

mod common;
mod entity;
mod services;

pub use common::common_routes;
pub use entity::entity_routes;
pub use services::service_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Uploads are the largest bodies accepted.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Full application: common routes at the root, everything else under `/api/v1`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1/dados", entity_routes(state.clone()))
        .nest("/api/v1", service_routes(state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}
