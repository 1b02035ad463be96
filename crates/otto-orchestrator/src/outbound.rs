//! §6 External Interfaces - the outbound job enqueue contract. The
//! orchestrator only constructs and enqueues this object; a separate
//! worker builds the vendor wire payload per `message_type` (out of
//! scope per spec.md §1).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Exactly the shape described in spec.md §6, field for field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundJob {
    pub to: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub idempotency_key: String,
    pub correlation_id: String,
    pub inbound_event_id: String,
}

impl OutboundJob {
    /// Minimal constructor for the one message sub-type this orchestrator
    /// actually produces on its own (plain text); every other field stays
    /// `None` until a richer kind is selected by the Master Decider
    /// (spec.md §1 Non-goals: building the per-kind payload is out of scope,
    /// but the job's shape still needs to carry the tag and text).
    pub fn text(
        to: impl Into<String>,
        text: impl Into<String>,
        idempotency_key: impl Into<String>,
        correlation_id: impl Into<String>,
        inbound_event_id: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            message_type: "text".to_string(),
            text: Some(text.into()),
            media_id: None,
            media_url: None,
            media_filename: None,
            media_mime_type: None,
            location: None,
            address: None,
            buttons: None,
            interactive_type: None,
            flow: None,
            cta: None,
            template: None,
            category: None,
            idempotency_key: idempotency_key.into(),
            correlation_id: correlation_id.into(),
            inbound_event_id: inbound_event_id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("outbound queue is closed")]
    Closed,
}

/// Fire-and-forget enqueue capability (spec.md §6, §1 "outbound async job
/// queue (enqueue fire-and-forget)" is an out-of-scope external collaborator
/// - the orchestrator only needs to push onto it).
#[async_trait]
pub trait OutboundQueue: Send + Sync {
    async fn enqueue(&self, job: OutboundJob) -> Result<(), QueueError>;
}

/// In-memory `tokio::mpsc` queue for tests and local dev (spec.md §6
/// "production wiring is left to the operator").
pub struct MpscOutboundQueue {
    sender: mpsc::UnboundedSender<OutboundJob>,
}

impl MpscOutboundQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl OutboundQueue for MpscOutboundQueue {
    async fn enqueue(&self, job: OutboundJob) -> Result<(), QueueError> {
        self.sender.send(job).map_err(|_| QueueError::Closed)
    }
}
