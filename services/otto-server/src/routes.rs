//! Route table (spec.md §6). Grounded on the teacher's `routes::api_v1_routes`
//! nesting shape, trimmed to the three endpoints this service exposes.

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::correlation_id_middleware;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/webhooks/whatsapp",
            get(handlers::webhook::verify).post(handlers::webhook::receive),
        )
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
