pub mod api;
pub mod common;

pub use api::api_routes;
pub use common::common_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Request bodies above this size are rejected before reaching a handler.
pub const BODY_LIMIT: usize = 1024 * 1024;

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        .merge(common_routes(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}
