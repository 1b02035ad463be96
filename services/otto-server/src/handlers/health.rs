//! Liveness endpoint. Grounded on the teacher's
//! `handlers::health::ping`/`HealthResponse` - this service has no database
//! of its own to probe, so there is no separate readiness check.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}
