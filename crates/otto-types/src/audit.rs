//! §3 AuditEvent / DecisionAuditRecord - hash-chained, per-user audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::{MasterDecisionOutput, ResponseGeneratorOutput, StateSelectorOutput};

/// Who performed an auditable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditActor {
    System,
    Human,
}

/// One hash-chained record in a user's audit log (spec.md §3).
///
/// Invariant: `hash = SHA256(canonical_json(event_without_hash) || prev_hash)`.
/// Computing and verifying that hash is the job of `otto-audit`; this type is
/// the plain data record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    /// Stable, non-reversible identifier: base64url(HMAC_SHA256(pepper, phone)).
    pub user_key: String,
    pub tenant_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub actor: AuditActor,
    pub action: String,
    pub reason: String,
    pub prev_hash: Option<String>,
    pub hash: String,
    pub correlation_id: Option<String>,
}

/// One row per pipeline execution, embedding a snapshot of every LLM's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionAuditRecord {
    pub correlation_id: String,
    pub final_state: String,
    pub apply_state: bool,
    pub selected_response_index: usize,
    pub message_kind: String,
    pub overall_confidence: f32,
    pub reason: String,
    pub state_selector: Option<StateSelectorOutput>,
    pub response_generator: Option<ResponseGeneratorOutput>,
    pub master_decision: Option<MasterDecisionOutput>,
    pub recorded_at: DateTime<Utc>,
}
