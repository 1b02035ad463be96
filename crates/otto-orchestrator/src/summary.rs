//! The webhook response body (spec.md §6 `POST /webhooks/whatsapp` 200 shape).

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookSummary {
    pub total_received: usize,
    pub total_deduped: usize,
    pub total_processed: usize,
    pub signature_validated: bool,
    pub signature_skipped: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl WebhookSummary {
    pub fn empty(signature_validated: bool, signature_skipped: bool) -> Self {
        Self {
            signature_validated,
            signature_skipped,
            ..Default::default()
        }
    }
}

/// The full `POST /webhooks/whatsapp` 200 body (spec.md §6: `{ok,
/// result:{...}}`). `WebhookSummary` carries the `result` fields; this
/// wraps it the one time it crosses the HTTP edge.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    pub result: WebhookSummary,
}

impl WebhookResponse {
    pub fn new(result: WebhookSummary) -> Self {
        Self { ok: true, result }
    }
}
