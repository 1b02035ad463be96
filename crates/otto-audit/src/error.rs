//! Audit-layer errors (spec.md §7 `AuditChainError`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit chain append failed for user-key {user_key} after {attempts} attempts")]
    ChainConflict { user_key: String, attempts: u32 },

    #[error("audit backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for AuditError {
    fn from(e: sqlx::Error) -> Self {
        AuditError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization(e.to_string())
    }
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;
