//! Registry and admin CRUD routes. Handlers resolve the entity from the path segment.

use crate::handlers::admin::{create, delete as delete_handler, list, read, update};
use crate::handlers::registry::{filters, index, meta};
use crate::state::AppState;
use axum::{routing::get, Router};

/// GET /registry, GET /registry/:entity, GET /registry/:entity/filters.
pub fn registry_routes(state: AppState) -> Router {
    Router::new()
        .route("/registry", get(index))
        .route("/registry/:path_segment", get(meta))
        .route("/registry/:path_segment/filters", get(filters))
        .with_state(state)
}

/// Changelist, add, change form, edit, and delete under /admin.
pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/:path_segment", get(list).post(create))
        .route(
            "/admin/:path_segment/:id",
            get(read).patch(update).delete(delete_handler),
        )
        .with_state(state)
}
