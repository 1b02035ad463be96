use thiserror::Error;

/// Mirrors `openibank-llm::types::LLMError`'s shape, trimmed to what the
/// orchestrator's fallback logic actually branches on.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("provider returned non-success status: {message}")]
    RequestFailed { message: String },

    #[error("response was not valid JSON: {message}")]
    InvalidJson { message: String },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;
