//! Routers for the admin API, mounted under `/api/v1`.

pub mod admin;
pub mod common;

pub use admin::{admin_routes, registry_routes};
pub use common::common_routes;

use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/v1";

/// Full application router with request tracing and a request body limit in bytes.
pub fn app(state: AppState, body_limit: usize) -> Router {
    let api = Router::new()
        .merge(common_routes(state.clone()))
        .merge(registry_routes(state.clone()))
        .merge(admin_routes(state));
    Router::new().nest(API_PREFIX, api).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(body_limit)),
    )
}
