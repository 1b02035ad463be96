//! C8 - State Selector (LLM#1), spec.md §4.8.

use std::time::{Duration, Instant};

use otto_core::config::LlmThresholds;
use otto_types::llm::{SelectorStatus, StateSelectorOutput};
use otto_validate::{apply_pre_check_clamp, validate_confidence_gate};
use serde::Deserialize;

use crate::client::LlmClient;

pub struct StateSelectorInput<'a> {
    pub current_state: &'a str,
    pub possible_next_states: &'a [String],
    pub message_text: &'a str,
    pub history_summary: &'a str,
    pub open_items: &'a [String],
    pub fulfilled_items: &'a [String],
    pub detected_requests: &'a [String],
}

#[derive(Deserialize)]
struct RawOutput {
    selected_state: String,
    confidence: f32,
    accepted: bool,
    next_state: String,
    response_hint: Option<String>,
    status: SelectorStatus,
    #[serde(default)]
    open_items: Vec<String>,
    #[serde(default)]
    fulfilled_items: Vec<String>,
    #[serde(default)]
    detected_requests: Vec<String>,
}

fn build_prompt(input: &StateSelectorInput<'_>) -> String {
    format!(
        "You are the conversation state selector for a support assistant. \
         Respond with a single JSON object with fields: selected_state, \
         confidence (0-1), accepted (bool), next_state, response_hint, \
         status (done|in_progress|needs_clarification|new_request_detected), \
         open_items, fulfilled_items, detected_requests.\n\n\
         current_state: {}\n\
         possible_next_states: {:?}\n\
         open_items: {:?}\n\
         fulfilled_items: {:?}\n\
         message: {}\n\
         history: {}",
        input.current_state,
        input.possible_next_states,
        input.open_items,
        input.fulfilled_items,
        input.message_text,
        input.history_summary,
    )
}

/// Call LLM#1, validate and confidence-gate its proposal, and fall back to
/// the deterministic safe response on any failure (spec.md §4.8 Contract).
pub async fn select_state(
    client: &dyn LlmClient,
    input: StateSelectorInput<'_>,
    thresholds: &LlmThresholds,
    timeout: Duration,
    model: Option<&str>,
) -> StateSelectorOutput {
    let started = Instant::now();
    let prompt = build_prompt(&input);

    let outcome = async {
        let value = client.complete(&prompt, model, timeout).await?;
        let raw: RawOutput = serde_json::from_value(value)
            .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        let built = StateSelectorOutput::new(
            raw.selected_state,
            raw.confidence,
            raw.accepted,
            raw.next_state,
            raw.response_hint,
            raw.status,
            raw.open_items,
            raw.fulfilled_items,
            raw.detected_requests,
        )
        .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        let clamped = apply_pre_check_clamp(built);
        validate_confidence_gate(&clamped, thresholds.state_selector_threshold)
            .map_err(|e| crate::error::LlmError::InvalidJson { message: e.to_string() })?;
        Ok::<_, crate::error::LlmError>(clamped)
    }
    .await;

    match outcome {
        Ok(output) => output,
        Err(reason) => {
            tracing::info!(
                fallback_used = true,
                component = "state_selector",
                reason = %reason,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "llm_fallback"
            );
            StateSelectorOutput::fallback(input.current_state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NoLlmClient;

    #[tokio::test]
    async fn unavailable_client_produces_fallback() {
        let client = NoLlmClient;
        let thresholds = LlmThresholds::default();
        let input = StateSelectorInput {
            current_state: "AWAITING_USER",
            possible_next_states: &[],
            message_text: "oi",
            history_summary: "",
            open_items: &[],
            fulfilled_items: &[],
            detected_requests: &[],
        };
        let output = select_state(&client, input, &thresholds, Duration::from_millis(50), None).await;
        assert!(!output.accepted);
        assert_eq!(output.next_state, "AWAITING_USER");
    }
}
