//! HTTP error mapping (spec.md §7 propagation policy). Grounded on the
//! teacher's `openibank_api::error::ApiError`, but the status code and body
//! come straight from `OttoError::http_status`/`Display` rather than a
//! second hand-maintained mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use otto_core::OttoError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: &'static str,
}

pub struct ApiError(pub OttoError);

impl From<OttoError> for ApiError {
    fn from(err: OttoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { detail: self.0.detail_tag() };
        (status, Json(body)).into_response()
    }
}
