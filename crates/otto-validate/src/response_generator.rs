//! Invariant checks for LLM#2 output (spec.md §4.9): the structural minimum
//! (>=3 responses, valid chosen_index) is already enforced by
//! `otto_types::llm::ResponseGeneratorOutput::new`; this adds the
//! configuration-aware minimum-count check (`RESPONSE_GENERATOR_MIN_RESPONSES`
//! may be raised above the spec default).

use otto_types::llm::ResponseGeneratorOutput;

use crate::error::{ValidateError, ValidateResult};

pub fn validate_response_count(output: &ResponseGeneratorOutput, min: usize) -> ValidateResult<()> {
    if output.responses.len() < min {
        return Err(ValidateError::TooFewResponses { min, got: output.responses.len() });
    }
    if output.chosen_index >= output.responses.len() {
        return Err(ValidateError::ResponseIndexOutOfBounds {
            index: output.chosen_index,
            len: output.responses.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_responses_satisfy_default_minimum() {
        let output = ResponseGeneratorOutput::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![],
            0,
            vec!["note".into()],
        )
        .unwrap();
        assert!(validate_response_count(&output, 3).is_ok());
    }

    #[test]
    fn raising_minimum_above_actual_count_fails() {
        let output = ResponseGeneratorOutput::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![],
            0,
            vec![],
        )
        .unwrap();
        assert!(matches!(
            validate_response_count(&output, 4),
            Err(ValidateError::TooFewResponses { min: 4, got: 3 })
        ));
    }
}
