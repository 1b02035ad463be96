//! §7 Error handling design - the shared semantic error taxonomy.
//!
//! Names match spec.md §7 exactly. Variants carry only what a caller needs to
//! decide propagation policy (HTTP status, whether to log+continue, whether
//! to retry) - never internal backend detail.

use thiserror::Error;

/// Taxonomy shared by every pipeline stage and the HTTP edge.
#[derive(Error, Debug)]
pub enum OttoError {
    #[error("invalid webhook signature")]
    SignatureError,

    #[error("malformed envelope json: {0}")]
    InvalidJson(String),

    #[error("batch of {received} messages exceeds limit of {limit}")]
    BatchTooLarge { received: usize, limit: usize },

    #[error("dedupe backend error: {0}")]
    DedupeError(String),

    #[error("session CAS exhausted after {attempts} attempts")]
    SessionConflict { attempts: u32 },

    #[error("llm stage {component} transient failure: {reason}")]
    LlmTransient { component: &'static str, reason: String },

    #[error("audit chain append failed: {0}")]
    AuditChainError(String),

    #[error("guard rejected message: {0}")]
    GuardRejection(String),

    #[error("outcome normalized to FAILED_INTERNAL: {0}")]
    OutcomeNormalization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl OttoError {
    /// Whether this kind is fatal for the whole HTTP request, as opposed to
    /// being recovered per-message inside the critical section (spec.md §7
    /// propagation policy).
    pub fn is_envelope_fatal(&self) -> bool {
        matches!(
            self,
            OttoError::SignatureError | OttoError::InvalidJson(_) | OttoError::BatchTooLarge { .. }
        )
    }

    pub fn http_status(&self) -> u16 {
        match self {
            OttoError::SignatureError => 401,
            OttoError::InvalidJson(_) => 400,
            OttoError::BatchTooLarge { .. } => 413,
            _ => 500,
        }
    }

    /// Semantic error tag for the HTTP response body (spec.md §6: e.g.
    /// `{"detail":"invalid_signature"}`, `invalid_json`, `batch_too_large`).
    pub fn detail_tag(&self) -> &'static str {
        match self {
            OttoError::SignatureError => "invalid_signature",
            OttoError::InvalidJson(_) => "invalid_json",
            OttoError::BatchTooLarge { .. } => "batch_too_large",
            OttoError::DedupeError(_) => "dedupe_error",
            OttoError::SessionConflict { .. } => "session_conflict",
            OttoError::LlmTransient { .. } => "llm_transient",
            OttoError::AuditChainError(_) => "audit_chain_error",
            OttoError::GuardRejection(_) => "guard_rejection",
            OttoError::OutcomeNormalization(_) => "outcome_normalization",
            OttoError::Config(_) => "config_error",
        }
    }
}

pub type OttoResult<T> = std::result::Result<T, OttoError>;
