//! Correlation-id middleware (spec.md §6 `x-correlation-id`, §9 "ambient
//! correlation-id"). Reads the inbound header if present, otherwise mints a
//! fresh id; either way it is echoed back on the response and scoped as the
//! ambient id for every `tracing` call made while handling the request
//! (`otto_core::with_correlation_id`). Grounded on the teacher's
//! `timing_middleware` request/response wrapping shape.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

pub async fn correlation_id_middleware(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(otto_core::new_correlation_id);

    req.extensions_mut().insert(CorrelationId(correlation_id.clone()));

    let header_value = HeaderValue::from_str(&correlation_id).ok();
    let mut response = otto_core::with_correlation_id(correlation_id, || next.run(req)).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
