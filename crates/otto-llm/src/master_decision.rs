//! C10 - Master Decider (LLM#3), spec.md §4.10. Authoritative: only this
//! stage's `apply_state=true` commits a new `final_state` to the session.

use std::time::{Duration, Instant};

use otto_types::llm::{MasterDecisionOutput, ResponseGeneratorOutput, StateSelectorOutput};
use otto_validate::validate_final_state;
use serde::Deserialize;

use crate::client::LlmClient;

pub struct MasterDecisionInput<'a> {
    pub last_user_message: &'a str,
    pub day_history: &'a str,
    pub state_selector: &'a StateSelectorOutput,
    pub response_generator: &'a ResponseGeneratorOutput,
    pub current_state: &'a str,
    pub correlation_id: &'a str,
}

#[derive(Deserialize)]
struct RawOutput {
    final_state: String,
    apply_state: bool,
    selected_response_index: usize,
    message_kind: String,
    overall_confidence: f32,
    reason: String,
    #[serde(default)]
    decision_trace: serde_json::Value,
}

fn build_prompt(input: &MasterDecisionInput<'_>) -> String {
    format!(
        "You are the authoritative decision maker. Respond with a JSON \
         object: final_state, apply_state (bool), selected_response_index, \
         message_kind, overall_confidence (0-1), reason (non-empty), \
         decision_trace.\n\n\
         correlation_id: {}\n\
         current_state: {}\n\
         state_selector: accepted={} confidence={} next_state={}\n\
         candidate_responses: {:?}\n\
         response_generator_chosen_index: {}\n\
         last_user_message: {}\n\
         day_history: {}",
        input.correlation_id,
        input.current_state,
        input.state_selector.accepted,
        input.state_selector.confidence,
        input.state_selector.next_state,
        input.response_generator.responses,
        input.response_generator.chosen_index,
        input.last_user_message,
        input.day_history,
    )
}

pub async fn decide(
    client: &dyn LlmClient,
    input: MasterDecisionInput<'_>,
    timeout: Duration,
    model: Option<&str>,
) -> MasterDecisionOutput {
    let started = Instant::now();
    let min_input_confidence = input.state_selector.confidence.min(1.0);
    let responses = input.response_generator.responses.clone();
    let chosen_index = input.response_generator.chosen_index;
    let prior_next_state = input.state_selector.next_state.clone();
    let prompt = build_prompt(&input);

    let outcome = async {
        let value = client.complete(&prompt, model, timeout).await?;
        let raw: RawOutput = serde_json::from_value(value)
            .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        let built = MasterDecisionOutput::new(
            raw.final_state,
            raw.apply_state,
            &responses,
            raw.selected_response_index,
            raw.message_kind,
            raw.overall_confidence,
            raw.reason,
            raw.decision_trace,
        )
        .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        validate_final_state(&built)
            .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        Ok::<_, crate::error::LlmError>(built)
    }
    .await;

    match outcome {
        Ok(output) => output,
        Err(reason) => {
            tracing::info!(
                fallback_used = true,
                component = "master_decider",
                reason = %reason,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "llm_fallback"
            );
            MasterDecisionOutput::fallback(prior_next_state, &responses, chosen_index, min_input_confidence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NoLlmClient;

    #[tokio::test]
    async fn unavailable_client_keeps_prior_next_state() {
        let client = NoLlmClient;
        let selector = StateSelectorOutput::fallback("AWAITING_USER");
        let generator = ResponseGeneratorOutput::fallback("Could you clarify?");
        let input = MasterDecisionInput {
            last_user_message: "oi",
            day_history: "",
            state_selector: &selector,
            response_generator: &generator,
            current_state: "AWAITING_USER",
            correlation_id: "corr-1",
        };
        let output = decide(&client, input, Duration::from_millis(50), None).await;
        assert!(!output.apply_state);
        assert_eq!(output.final_state, "AWAITING_USER");
        assert_eq!(output.reason, "llm3_fallback");
    }
}
