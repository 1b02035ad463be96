//! Invariant checks for LLM#3 output (spec.md §4.10). Index-vs-text
//! consistency and non-empty reason are already enforced by
//! `otto_types::llm::MasterDecisionOutput::new`; this adds the final-state
//! alphabet check and the overall-confidence gate.

use otto_fsm::State;
use otto_types::llm::MasterDecisionOutput;

use crate::error::{ValidateError, ValidateResult};

pub fn validate_final_state(output: &MasterDecisionOutput) -> ValidateResult<()> {
    if State::from_str(&output.final_state).is_none() {
        return Err(ValidateError::UnknownState { state: output.final_state.clone() });
    }
    if output.reason.trim().is_empty() {
        return Err(ValidateError::EmptyReason);
    }
    if !(0.0..=1.0).contains(&output.overall_confidence) {
        return Err(ValidateError::ConfidenceOutOfRange { confidence: output.overall_confidence });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_final_state_passes() {
        let responses = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let output = MasterDecisionOutput::new(
            "AWAITING_USER", true, &responses, 0, "text", 0.8, "ok", serde_json::json!({}),
        )
        .unwrap();
        assert!(validate_final_state(&output).is_ok());
    }

    #[test]
    fn unknown_final_state_is_rejected() {
        let responses = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let output = MasterDecisionOutput::new(
            "BOGUS", true, &responses, 0, "text", 0.8, "ok", serde_json::json!({}),
        )
        .unwrap();
        assert!(matches!(
            validate_final_state(&output),
            Err(ValidateError::UnknownState { .. })
        ));
    }
}
