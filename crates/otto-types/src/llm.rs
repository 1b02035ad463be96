//! §4.8-§4.10 LLM advisor contracts: State Selector, Response Generator, Master Decider.
//!
//! These are runtime-validated record types (§9 Design Notes): structural
//! invariants that never depend on configuration (non-empty lists, index
//! bounds, non-empty reason) are enforced here at construction. The
//! confidence-threshold business rule (`accepted ⇒ confidence >= THRESHOLD`)
//! is configuration-dependent and lives in `otto-validate`.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Where the State Selector thinks the conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStatus {
    Done,
    InProgress,
    NeedsClarification,
    NewRequestDetected,
}

/// Output of LLM#1 (State Selector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSelectorOutput {
    pub selected_state: String,
    pub confidence: f32,
    pub accepted: bool,
    pub next_state: String,
    pub response_hint: Option<String>,
    pub status: SelectorStatus,
    #[serde(default)]
    pub open_items: Vec<String>,
    #[serde(default)]
    pub fulfilled_items: Vec<String>,
    #[serde(default)]
    pub detected_requests: Vec<String>,
}

impl StateSelectorOutput {
    /// Build a candidate output, checking only the structural invariant that
    /// a rejected proposal must carry a clarifying hint. The confidence
    /// threshold gate is applied by `otto-validate`.
    pub fn new(
        selected_state: impl Into<String>,
        confidence: f32,
        accepted: bool,
        next_state: impl Into<String>,
        response_hint: Option<String>,
        status: SelectorStatus,
        open_items: Vec<String>,
        fulfilled_items: Vec<String>,
        detected_requests: Vec<String>,
    ) -> ValidationResult<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::OutOfBounds {
                what: "confidence",
                reason: format!("{confidence} not in [0,1]"),
            });
        }
        if !accepted && response_hint.is_none() {
            return Err(ValidationError::MissingField { field: "response_hint" });
        }
        Ok(Self {
            selected_state: selected_state.into(),
            confidence,
            accepted,
            next_state: next_state.into(),
            response_hint,
            status,
            open_items,
            fulfilled_items,
            detected_requests,
        })
    }

    /// The deterministic safe fallback used when no LLM client is configured
    /// or the call fails (spec.md §4.8 Contract).
    pub fn fallback(current_state: impl Into<String>) -> Self {
        let current_state = current_state.into();
        Self {
            selected_state: current_state.clone(),
            confidence: 0.0,
            accepted: false,
            next_state: current_state,
            response_hint: Some("Could you clarify?".to_string()),
            status: SelectorStatus::NeedsClarification,
            open_items: Vec::new(),
            fulfilled_items: Vec::new(),
            detected_requests: Vec::new(),
        }
    }
}

/// Output of LLM#2 (Response Generator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseGeneratorOutput {
    pub responses: Vec<String>,
    #[serde(default)]
    pub response_style_tags: Vec<String>,
    pub chosen_index: usize,
    #[serde(default)]
    pub safety_notes: Vec<String>,
}

/// Minimum number of candidate replies required (spec.md §4.9, §6 default).
pub const MIN_RESPONSES: usize = 3;

impl ResponseGeneratorOutput {
    pub fn new(
        responses: Vec<String>,
        response_style_tags: Vec<String>,
        chosen_index: usize,
        safety_notes: Vec<String>,
    ) -> ValidationResult<Self> {
        if responses.len() < MIN_RESPONSES {
            return Err(ValidationError::OutOfBounds {
                what: "responses",
                reason: format!("only {} of {MIN_RESPONSES} required", responses.len()),
            });
        }
        if chosen_index >= responses.len() {
            return Err(ValidationError::OutOfBounds {
                what: "chosen_index",
                reason: format!("{chosen_index} out of range for {} responses", responses.len()),
            });
        }
        Ok(Self {
            responses,
            response_style_tags,
            chosen_index,
            safety_notes,
        })
    }

    /// Deterministic fallback: three neutral closure prompts derived from the
    /// state selector's hint (spec.md §4.9 Contract).
    pub fn fallback(hint: &str) -> Self {
        let hint = if hint.trim().is_empty() {
            "Could you tell me a bit more?"
        } else {
            hint
        };
        Self {
            responses: vec![
                format!("{hint} Posso ajudar a esclarecer o que falta?"),
                format!("{hint} Fico à disposição para continuar."),
                format!("{hint} Se preferir, posso encaminhar para um atendente."),
            ],
            response_style_tags: vec!["neutral_closure".to_string()],
            chosen_index: 0,
            safety_notes: vec!["fallback_used".to_string()],
        }
    }
}

/// Output of LLM#3 (Master Decider) - authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterDecisionOutput {
    pub final_state: String,
    pub apply_state: bool,
    pub selected_response_index: usize,
    pub selected_response_text: String,
    pub message_kind: String,
    pub overall_confidence: f32,
    pub reason: String,
    pub decision_trace: serde_json::Value,
}

impl MasterDecisionOutput {
    pub fn new(
        final_state: impl Into<String>,
        apply_state: bool,
        responses: &[String],
        selected_response_index: usize,
        message_kind: impl Into<String>,
        overall_confidence: f32,
        reason: impl Into<String>,
        decision_trace: serde_json::Value,
    ) -> ValidationResult<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "reason" });
        }
        if !(0.0..=1.0).contains(&overall_confidence) {
            return Err(ValidationError::OutOfBounds {
                what: "overall_confidence",
                reason: format!("{overall_confidence} not in [0,1]"),
            });
        }
        let selected_response_text = responses
            .get(selected_response_index)
            .cloned()
            .ok_or_else(|| ValidationError::OutOfBounds {
                what: "selected_response_index",
                reason: format!(
                    "{selected_response_index} out of range for {} responses",
                    responses.len()
                ),
            })?;

        Ok(Self {
            final_state: final_state.into(),
            apply_state,
            selected_response_index,
            selected_response_text,
            message_kind: message_kind.into(),
            overall_confidence,
            reason,
            decision_trace,
        })
    }

    /// Deterministic fallback (spec.md §4.10 Contract): keeps the selector's
    /// accepted next-state, the generator's chosen index, text = text.
    pub fn fallback(
        prior_next_state: impl Into<String>,
        responses: &[String],
        chosen_index: usize,
        min_input_confidence: f32,
    ) -> Self {
        let text = responses.get(chosen_index).cloned().unwrap_or_default();
        Self {
            final_state: prior_next_state.into(),
            apply_state: false,
            selected_response_index: chosen_index,
            selected_response_text: text,
            message_kind: "text".to_string(),
            overall_confidence: min_input_confidence.clamp(0.0, 1.0),
            reason: "llm3_fallback".to_string(),
            decision_trace: serde_json::json!({ "fallback": true }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_selector_requires_hint_when_rejected() {
        let err = StateSelectorOutput::new(
            "INIT", 0.2, false, "INIT", None, SelectorStatus::NeedsClarification,
            vec![], vec![], vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: "response_hint" }));
    }

    #[test]
    fn response_generator_rejects_fewer_than_three() {
        let err = ResponseGeneratorOutput::new(
            vec!["a".into(), "b".into()],
            vec![],
            0,
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfBounds { what: "responses", .. }));
    }

    #[test]
    fn master_decision_text_must_match_index() {
        let responses = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out = MasterDecisionOutput::new(
            "AWAITING_USER", true, &responses, 1, "text", 0.9, "ok",
            serde_json::json!({}),
        )
        .unwrap();
        assert_eq!(out.selected_response_text, "b");
    }

    #[test]
    fn master_decision_rejects_out_of_range_index() {
        let responses = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = MasterDecisionOutput::new(
            "AWAITING_USER", true, &responses, 5, "text", 0.9, "ok",
            serde_json::json!({}),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfBounds { what: "selected_response_index", .. }));
    }
}
