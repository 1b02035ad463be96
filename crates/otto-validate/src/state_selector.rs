//! Confidence gate and pre-check clamp for LLM#1 (spec.md §4.8).

use otto_fsm::State;
use otto_types::llm::{SelectorStatus, StateSelectorOutput};

use crate::error::{ValidateError, ValidateResult};

/// `accepted ⇒ confidence >= threshold`, and `next_state`/`selected_state`
/// must be members of the FSM alphabet.
pub fn validate_confidence_gate(
    output: &StateSelectorOutput,
    threshold: f32,
) -> ValidateResult<()> {
    if State::from_str(&output.selected_state).is_none() {
        return Err(ValidateError::UnknownState { state: output.selected_state.clone() });
    }
    if State::from_str(&output.next_state).is_none() {
        return Err(ValidateError::UnknownState { state: output.next_state.clone() });
    }
    if output.accepted && output.confidence < threshold {
        return Err(ValidateError::AcceptedBelowThreshold {
            confidence: output.confidence,
            threshold,
        });
    }
    Ok(())
}

/// Pre-check clamp (spec.md §4.8): a message that looks like closure but
/// still has open items, or that introduces an unrelated new request,
/// overrides the raw LLM status before the confidence gate is applied.
/// Returns the (possibly clamped) output.
pub fn apply_pre_check_clamp(mut output: StateSelectorOutput) -> StateSelectorOutput {
    if output.status == SelectorStatus::Done && !output.open_items.is_empty() {
        output.status = SelectorStatus::NeedsClarification;
        output.accepted = false;
    } else if !output.detected_requests.is_empty() && output.status != SelectorStatus::NewRequestDetected {
        output.status = SelectorStatus::NewRequestDetected;
        output.accepted = false;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted_output(confidence: f32) -> StateSelectorOutput {
        StateSelectorOutput::new(
            "AWAITING_USER",
            confidence,
            true,
            "AWAITING_USER",
            None,
            SelectorStatus::Done,
            vec![],
            vec![],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn accepted_above_threshold_passes() {
        assert!(validate_confidence_gate(&accepted_output(0.8), 0.7).is_ok());
    }

    #[test]
    fn accepted_below_threshold_is_rejected() {
        let err = validate_confidence_gate(&accepted_output(0.5), 0.7).unwrap_err();
        assert!(matches!(err, ValidateError::AcceptedBelowThreshold { .. }));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let output = StateSelectorOutput::new(
            "NOT_A_STATE", 0.9, true, "NOT_A_STATE", None, SelectorStatus::Done,
            vec![], vec![], vec![],
        )
        .unwrap();
        assert!(matches!(
            validate_confidence_gate(&output, 0.7),
            Err(ValidateError::UnknownState { .. })
        ));
    }

    #[test]
    fn open_items_clamp_done_to_needs_clarification() {
        let output = StateSelectorOutput::new(
            "AWAITING_USER", 0.9, true, "AWAITING_USER", Some("hint".into()),
            SelectorStatus::Done, vec!["email".into()], vec![], vec![],
        )
        .unwrap();
        let clamped = apply_pre_check_clamp(output);
        assert_eq!(clamped.status, SelectorStatus::NeedsClarification);
        assert!(!clamped.accepted);
    }

    #[test]
    fn detected_requests_clamp_to_new_request() {
        let output = StateSelectorOutput::new(
            "AWAITING_USER", 0.9, true, "AWAITING_USER", Some("hint".into()),
            SelectorStatus::Done, vec![], vec![], vec!["cancel_order".into()],
        )
        .unwrap();
        let clamped = apply_pre_check_clamp(output);
        assert_eq!(clamped.status, SelectorStatus::NewRequestDetected);
        assert!(!clamped.accepted);
    }
}
