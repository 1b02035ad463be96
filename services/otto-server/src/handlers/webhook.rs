//! `/webhooks/whatsapp` handlers (spec.md §6). `GET` answers the Meta
//! subscription challenge; `POST` is the one entry point into the pipeline.
//! Grounded on the teacher's `handlers::account`/`handlers::auth` shape
//! (extract → validate → delegate to the domain layer → serialize), with
//! the account/auth domain calls replaced by signature verification and
//! `Orchestrator::process_envelope`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use otto_core::OttoError;

use crate::error::ApiError;
use crate::middleware::CorrelationId;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// `GET /webhooks/whatsapp` - subscription verification handshake. A missing
/// server-side `WHATSAPP_VERIFY_TOKEN` is a deployment misconfiguration
/// rather than a rejected caller, so it answers 500 instead of 403 (spec.md
/// §6).
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(expected) = state.config.whatsapp_verify_token.as_deref() else {
        tracing::error!("whatsapp_verify_token_unset");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mode = params.get("hub.mode").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
    let token = params.get("hub.verify_token").map(String::as_str);

    match (mode, token) {
        (Some("subscribe"), Some(provided)) if provided == expected => {
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            tracing::warn!("whatsapp_webhook_verification_rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// `POST /webhooks/whatsapp` - the one entry point into the pipeline
/// (spec.md §6): verify the signature, parse the envelope, hand it to the
/// orchestrator, return its summary unchanged.
pub async fn receive(
    State(state): State<Arc<AppState>>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let signature = otto_signature::verify_signature(
        &body,
        signature_header,
        state.config.whatsapp_webhook_secret.as_deref(),
    );

    if !signature.valid {
        tracing::warn!(
            correlation_id = %correlation_id,
            reason = signature.error.unwrap_or("unknown"),
            "whatsapp_webhook_signature_rejected"
        );
        return Err(ApiError(OttoError::SignatureError));
    }

    let envelope: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError(OttoError::InvalidJson(e.to_string())))?;

    let mut summary = state
        .orchestrator
        .process_envelope(&envelope, &correlation_id)
        .await
        .map_err(ApiError)?;

    summary.signature_validated = signature.valid && !signature.skipped;
    summary.signature_skipped = signature.skipped;

    Ok(Json(otto_orchestrator::WebhookResponse::new(summary)))
}
