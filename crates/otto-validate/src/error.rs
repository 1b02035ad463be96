use thiserror::Error;

/// Mirrors `openibank-guard::GuardError`'s shape, generalized from
/// monetary-policy checks to LLM output invariants.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("confidence {confidence} is out of range [0,1]")]
    ConfidenceOutOfRange { confidence: f32 },

    #[error("accepted=true requires confidence >= {threshold}, got {confidence}")]
    AcceptedBelowThreshold { confidence: f32, threshold: f32 },

    #[error("response index {index} out of bounds for {len} responses")]
    ResponseIndexOutOfBounds { index: usize, len: usize },

    #[error("selected_response_text does not match responses[selected_response_index]")]
    ResponseTextMismatch,

    #[error("fewer than {min} responses were produced ({got})")]
    TooFewResponses { min: usize, got: usize },

    #[error("state tag '{state}' is not a member of the FSM alphabet")]
    UnknownState { state: String },

    #[error("reason must be non-empty")]
    EmptyReason,
}

pub type ValidateResult<T> = std::result::Result<T, ValidateError>;
