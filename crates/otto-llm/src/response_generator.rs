//! C9 - Response Generator (LLM#2), spec.md §4.9. Always called, even when
//! the State Selector rejected its proposal - it needs the hint precisely
//! in that case.

use std::time::{Duration, Instant};

use otto_types::llm::{ResponseGeneratorOutput, StateSelectorOutput};
use otto_validate::validate_response_count;
use serde::Deserialize;

use crate::client::LlmClient;

pub struct ResponseGeneratorInput<'a> {
    pub state_selector: &'a StateSelectorOutput,
    pub current_state: &'a str,
    pub last_user_message: &'a str,
    pub day_history: &'a str,
}

#[derive(Deserialize)]
struct RawOutput {
    responses: Vec<String>,
    #[serde(default)]
    response_style_tags: Vec<String>,
    chosen_index: usize,
    #[serde(default)]
    safety_notes: Vec<String>,
}

fn build_prompt(input: &ResponseGeneratorInput<'_>) -> String {
    format!(
        "You are drafting candidate WhatsApp replies. Respond with a JSON \
         object: responses (at least 3 strings), response_style_tags, \
         chosen_index (0-based into responses), safety_notes.\n\n\
         current_state: {}\n\
         state_selector_confidence: {}\n\
         state_selector_accepted: {}\n\
         response_hint: {}\n\
         last_user_message: {}\n\
         day_history: {}",
        input.current_state,
        input.state_selector.confidence,
        input.state_selector.accepted,
        input.state_selector.response_hint.as_deref().unwrap_or(""),
        input.last_user_message,
        input.day_history,
    )
}

pub async fn generate_responses(
    client: &dyn LlmClient,
    input: ResponseGeneratorInput<'_>,
    min_responses: usize,
    timeout: Duration,
    model: Option<&str>,
) -> ResponseGeneratorOutput {
    let started = Instant::now();
    let hint = input.state_selector.response_hint.clone().unwrap_or_default();
    let prompt = build_prompt(&input);

    let outcome = async {
        let value = client.complete(&prompt, model, timeout).await?;
        let raw: RawOutput = serde_json::from_value(value)
            .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        let built = ResponseGeneratorOutput::new(
            raw.responses,
            raw.response_style_tags,
            raw.chosen_index,
            raw.safety_notes,
        )
        .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        validate_response_count(&built, min_responses)
            .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        Ok::<_, crate::error::LlmError>(built)
    }
    .await;

    match outcome {
        Ok(output) => output,
        Err(reason) => {
            tracing::info!(
                fallback_used = true,
                component = "response_generator",
                reason = %reason,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "llm_fallback"
            );
            ResponseGeneratorOutput::fallback(&hint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NoLlmClient;
    use otto_types::llm::SelectorStatus;

    #[tokio::test]
    async fn unavailable_client_produces_three_fallback_responses() {
        let client = NoLlmClient;
        let selector = StateSelectorOutput::fallback("AWAITING_USER");
        let input = ResponseGeneratorInput {
            state_selector: &selector,
            current_state: "AWAITING_USER",
            last_user_message: "oi",
            day_history: "",
        };
        let output = generate_responses(&client, input, 3, Duration::from_millis(50), None).await;
        assert_eq!(output.responses.len(), 3);
        assert_eq!(output.chosen_index, 0);
        assert_eq!(selector.status, SelectorStatus::NeedsClarification);
    }
}
