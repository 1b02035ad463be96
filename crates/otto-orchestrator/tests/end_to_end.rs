//! End-to-end pipeline scenarios (spec.md §8): one sender, a full stack of
//! in-memory backends, and the real `Orchestrator`. Each test exercises the
//! fixed pipeline through its public entry point rather than any single
//! stage in isolation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use otto_audit::{MemoryDecisionAuditLog, MemoryUserAuditLog};
use otto_core::{OrchestratorConfig, OttoError};
use otto_guards::MemoryFloodDetector;
use otto_llm::client::LlmClient;
use otto_llm::error::{LlmError, LlmResult};
use otto_llm::NoLlmClient;
use otto_orchestrator::{MpscOutboundQueue, Orchestrator};
use otto_session::SessionManager;
use otto_signature::verify_signature;
use otto_store::{MemoryDedupeStore, MemorySessionStore};
use serde_json::{json, Value};

fn text_envelope(message_id: &str, from: &str, body: &str) -> Value {
    json!({
        "entry": [{
            "changes": [{
                "value": {
                    "messages": [{
                        "id": message_id,
                        "from": from,
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": { "body": body },
                    }]
                }
            }]
        }]
    })
}

fn batch_envelope(count: usize) -> Value {
    let messages: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "id": format!("batch-{i}"),
                "from": "5511999999999",
                "timestamp": "1700000000",
                "type": "text",
                "text": { "body": format!("message {i}") },
            })
        })
        .collect();
    json!({ "entry": [{ "changes": [{ "value": { "messages": messages } }] }] })
}

/// A batch with `valid` normal messages plus `dropped` messages missing the
/// vendor `id` field, so they are counted but never reach `messages`.
fn batch_envelope_with_drops(valid: usize, dropped: usize) -> Value {
    let mut messages: Vec<Value> = (0..valid)
        .map(|i| {
            json!({
                "id": format!("ok-{i}"),
                "from": "5511999999999",
                "timestamp": "1700000000",
                "type": "text",
                "text": { "body": format!("message {i}") },
            })
        })
        .collect();
    messages.extend((0..dropped).map(|i| {
        json!({
            "from": "5511999999999",
            "timestamp": "1700000000",
            "type": "text",
            "text": { "body": format!("no id {i}") },
        })
    }));
    json!({ "entry": [{ "changes": [{ "value": { "messages": messages } }] }] })
}

/// Builds an `Orchestrator` over fresh in-memory backends and a given LLM
/// client, plus a handle to drain whatever it enqueues.
fn build_orchestrator(
    llm_client: Arc<dyn LlmClient>,
) -> (Orchestrator, tokio::sync::mpsc::UnboundedReceiver<otto_orchestrator::OutboundJob>) {
    let config = OrchestratorConfig::development_defaults();
    let dedupe_store = Arc::new(MemoryDedupeStore::new());
    let session_manager = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        Duration::from_secs(config.session_ttl_seconds),
        config.session_message_history_max_entries,
    );
    let flood_detector = Arc::new(MemoryFloodDetector::new(
        config.flood_threshold,
        Duration::from_secs(config.flood_ttl_seconds),
    ));
    let (outbound_queue, receiver) = MpscOutboundQueue::new();
    let orchestrator = Orchestrator::new(
        config,
        dedupe_store,
        session_manager,
        flood_detector,
        llm_client,
        Arc::new(MemoryUserAuditLog::new()),
        Arc::new(MemoryDecisionAuditLog::new()),
        Arc::new(outbound_queue),
    );
    (orchestrator, receiver)
}

#[tokio::test]
async fn happy_path_single_text_message_is_processed_and_enqueued() {
    let (orchestrator, mut receiver) = build_orchestrator(Arc::new(NoLlmClient));
    let envelope = text_envelope("m1", "5511999999999", "Oi, preciso de ajuda");

    let summary = orchestrator.process_envelope(&envelope, "corr-1").await.unwrap();

    assert_eq!(summary.total_received, 1);
    assert_eq!(summary.total_processed, 1);
    assert_eq!(summary.total_deduped, 0);
    assert!(summary.errors.is_empty());

    let job = receiver.recv().await.expect("a reply should have been enqueued");
    assert_eq!(job.to, "+5511999999999");
    assert!(job.text.unwrap().contains("Otto"), "first reply of the day should carry the intro");
}

#[tokio::test]
async fn duplicate_delivery_of_the_same_message_is_not_reprocessed() {
    let (orchestrator, mut receiver) = build_orchestrator(Arc::new(NoLlmClient));
    let envelope = text_envelope("m1", "5511999999999", "Oi");

    let first = orchestrator.process_envelope(&envelope, "corr-1").await.unwrap();
    assert_eq!(first.total_processed, 1);
    receiver.recv().await.expect("first delivery enqueues a reply");

    let second = orchestrator.process_envelope(&envelope, "corr-2").await.unwrap();
    assert_eq!(second.total_processed, 0);
    assert_eq!(second.total_deduped, 1);
    assert!(receiver.try_recv().is_err(), "duplicate delivery must not enqueue a second reply");
}

#[test]
fn invalid_signature_is_rejected_before_the_pipeline_runs() {
    let body = br#"{"entry":[]}"#;
    let result = verify_signature(body, Some("sha256=deadbeef"), Some("shared-secret"));
    assert!(!result.valid);
    assert!(!result.skipped);
    assert_eq!(result.error, Some("signature_mismatch"));
}

/// Fake advisor: succeeds for State Selector and Master Decider, times out
/// for the Response Generator - spec.md §8 scenario "LLM#2 timeout".
struct Llm2TimesOutClient;

#[async_trait]
impl LlmClient for Llm2TimesOutClient {
    async fn complete(
        &self,
        prompt: &str,
        _model: Option<&str>,
        _timeout: Duration,
    ) -> LlmResult<Value> {
        if prompt.contains("conversation state selector") {
            return Ok(json!({
                "selected_state": "AWAITING_USER",
                "confidence": 0.9,
                "accepted": true,
                "next_state": "AWAITING_USER",
                "response_hint": null,
                "status": "in_progress",
                "open_items": [],
                "fulfilled_items": [],
                "detected_requests": [],
            }));
        }
        if prompt.contains("drafting candidate WhatsApp replies") {
            return Err(LlmError::Timeout { elapsed_ms: 8_000 });
        }
        if prompt.contains("authoritative decision maker") {
            return Ok(json!({
                "final_state": "AWAITING_USER",
                "apply_state": true,
                "selected_response_index": 0,
                "message_kind": "text",
                "overall_confidence": 0.65,
                "reason": "response generator fell back to neutral closures",
                "decision_trace": {},
            }));
        }
        unreachable!("unexpected prompt: {prompt}")
    }
}

#[tokio::test]
async fn llm2_timeout_falls_back_to_three_neutral_responses() {
    let (orchestrator, mut receiver) = build_orchestrator(Arc::new(Llm2TimesOutClient));
    let envelope = text_envelope("m1", "5511999999999", "Quero saber do meu pedido");

    let summary = orchestrator.process_envelope(&envelope, "corr-1").await.unwrap();
    assert_eq!(summary.total_processed, 1);

    let job = receiver.recv().await.expect("a fallback reply should still be enqueued");
    assert!(job.text.is_some());
}

#[tokio::test]
async fn flood_threshold_trips_and_is_counted_as_processed() {
    let config = OrchestratorConfig { flood_threshold: 10, ..OrchestratorConfig::development_defaults() };
    let dedupe_store = Arc::new(MemoryDedupeStore::new());
    let session_manager = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        Duration::from_secs(config.session_ttl_seconds),
        config.session_message_history_max_entries,
    );
    let flood_detector = Arc::new(MemoryFloodDetector::new(
        config.flood_threshold,
        Duration::from_secs(config.flood_ttl_seconds),
    ));
    let (outbound_queue, mut receiver) = MpscOutboundQueue::new();
    let orchestrator = Orchestrator::new(
        config,
        dedupe_store,
        session_manager,
        flood_detector,
        Arc::new(NoLlmClient),
        Arc::new(MemoryUserAuditLog::new()),
        Arc::new(MemoryDecisionAuditLog::new()),
        Arc::new(outbound_queue),
    );

    let mut last_summary = None;
    for i in 0..11 {
        let envelope = text_envelope(&format!("m{i}"), "5511999999999", "oi");
        last_summary = Some(orchestrator.process_envelope(&envelope, "corr-flood").await.unwrap());
        let _ = receiver.try_recv();
    }

    let summary = last_summary.unwrap();
    assert_eq!(summary.total_processed, 1, "the 11th message is still counted as processed");
    assert!(summary.errors.is_empty());
}

/// Fake advisor that reports a freshly detected request every turn, so the
/// intent queue fills toward `MAX_INTENTS` across successive messages from
/// the same sender - spec.md §4.6 intent capacity guard / §4.8 outputs
/// `detected-requests`.
struct DetectingClient {
    calls: std::sync::atomic::AtomicUsize,
}

impl DetectingClient {
    fn new() -> Self {
        Self { calls: std::sync::atomic::AtomicUsize::new(0) }
    }
}

#[async_trait]
impl LlmClient for DetectingClient {
    async fn complete(
        &self,
        prompt: &str,
        _model: Option<&str>,
        _timeout: Duration,
    ) -> LlmResult<Value> {
        if prompt.contains("conversation state selector") {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            return Ok(json!({
                "selected_state": "AWAITING_USER",
                "confidence": 0.9,
                "accepted": true,
                "next_state": "AWAITING_USER",
                "response_hint": null,
                "status": "new_request_detected",
                "open_items": [],
                "fulfilled_items": [],
                "detected_requests": [format!("intent-{n}")],
            }));
        }
        if prompt.contains("drafting candidate WhatsApp replies") {
            return Ok(json!({
                "responses": ["a", "b", "c"],
                "response_style_tags": [],
                "chosen_index": 0,
                "safety_notes": [],
            }));
        }
        if prompt.contains("authoritative decision maker") {
            return Ok(json!({
                "final_state": "AWAITING_USER",
                "apply_state": true,
                "selected_response_index": 0,
                "message_kind": "text",
                "overall_confidence": 0.9,
                "reason": "ok",
                "decision_trace": {},
            }));
        }
        unreachable!("unexpected prompt: {prompt}")
    }
}

#[tokio::test]
async fn intent_queue_fills_across_turns_and_trips_the_capacity_guard() {
    let (orchestrator, mut receiver) = build_orchestrator(Arc::new(DetectingClient::new()));

    for i in 0..3 {
        let envelope = text_envelope(&format!("m{i}"), "5511999999999", "novo pedido");
        let summary = orchestrator.process_envelope(&envelope, "corr-1").await.unwrap();
        assert_eq!(summary.total_processed, 1);
        receiver.recv().await.expect("a reply is still enqueued while under capacity");
    }

    // The 4th distinct request arrives once the queue already holds
    // MAX_INTENTS (3) items detected on the previous turns: the capacity
    // guard must now reject it before any LLM call or outbound reply.
    let envelope = text_envelope("m3", "5511999999999", "mais um pedido");
    let summary = orchestrator.process_envelope(&envelope, "corr-1").await.unwrap();
    assert_eq!(summary.total_processed, 1, "guard rejection still counts as processed");
    assert!(receiver.try_recv().is_err(), "a capacity-rejected turn must not enqueue a reply");
}

#[tokio::test]
async fn batch_over_the_limit_is_rejected_before_any_message_is_touched() {
    let (orchestrator, mut receiver) = build_orchestrator(Arc::new(NoLlmClient));
    let envelope = batch_envelope(101);

    let err = orchestrator.process_envelope(&envelope, "corr-1").await.unwrap_err();
    match err {
        OttoError::BatchTooLarge { received, limit } => {
            assert_eq!(received, 101);
            assert_eq!(limit, 100);
        }
        other => panic!("expected BatchTooLarge, got {other:?}"),
    }
    assert!(err.is_envelope_fatal());
    assert_eq!(err.http_status(), 413);
    assert!(receiver.try_recv().is_err(), "nothing should have been enqueued");
}

/// Fake advisor that finishes the conversation on the first turn
/// (`final_state: COMPLETED`) and captures the State Selector prompt it is
/// sent on the following turn, so the test can check what
/// `possible-next-states` looked like once the session was already
/// terminal - spec.md §4.8 "possible-next-states (non-empty)".
struct TerminalThenFollowupClient {
    calls: std::sync::atomic::AtomicUsize,
    second_selector_prompt: std::sync::Mutex<Option<String>>,
}

impl TerminalThenFollowupClient {
    fn new() -> Self {
        Self {
            calls: std::sync::atomic::AtomicUsize::new(0),
            second_selector_prompt: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl LlmClient for TerminalThenFollowupClient {
    async fn complete(
        &self,
        prompt: &str,
        _model: Option<&str>,
        _timeout: Duration,
    ) -> LlmResult<Value> {
        if prompt.contains("conversation state selector") {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 1 {
                *self.second_selector_prompt.lock().unwrap() = Some(prompt.to_string());
            }
            return Ok(json!({
                "selected_state": "AWAITING_USER",
                "confidence": 0.9,
                "accepted": true,
                "next_state": "AWAITING_USER",
                "response_hint": null,
                "status": "in_progress",
                "open_items": [],
                "fulfilled_items": [],
                "detected_requests": [],
            }));
        }
        if prompt.contains("drafting candidate WhatsApp replies") {
            return Ok(json!({
                "responses": ["a", "b", "c"],
                "response_style_tags": [],
                "chosen_index": 0,
                "safety_notes": [],
            }));
        }
        if prompt.contains("authoritative decision maker") {
            return Ok(json!({
                "final_state": "COMPLETED",
                "apply_state": true,
                "selected_response_index": 0,
                "message_kind": "text",
                "overall_confidence": 0.9,
                "reason": "resolved",
                "decision_trace": {},
            }));
        }
        unreachable!("unexpected prompt: {prompt}")
    }
}

#[tokio::test]
async fn terminal_session_still_gets_a_non_empty_possible_next_states_input() {
    let client = Arc::new(TerminalThenFollowupClient::new());
    let (orchestrator, mut receiver) = build_orchestrator(client.clone());

    let first = text_envelope("m1", "5511999999999", "resolve isso para mim");
    orchestrator.process_envelope(&first, "corr-1").await.unwrap();
    receiver.recv().await.expect("first turn still enqueues a reply");

    let follow_up = text_envelope("m2", "5511999999999", "obrigado");
    orchestrator.process_envelope(&follow_up, "corr-1").await.unwrap();

    let captured = client.second_selector_prompt.lock().unwrap().clone();
    let prompt = captured.expect("a second state selector call should have happened");
    assert!(prompt.contains("current_state: COMPLETED"));
    assert!(
        prompt.contains("possible_next_states: [\"COMPLETED\"]"),
        "terminal session should seed possible_next_states with the terminal state itself, got: {prompt}"
    );
}

#[tokio::test]
async fn batch_cap_counts_dropped_messages_across_the_envelope() {
    let (orchestrator, mut receiver) = build_orchestrator(Arc::new(NoLlmClient));
    // 60 normalizable messages + 90 dropped (missing id) = 150 raw messages,
    // over the cap even though only 60 would ever reach the pipeline.
    let envelope = batch_envelope_with_drops(60, 90);

    let err = orchestrator.process_envelope(&envelope, "corr-1").await.unwrap_err();
    match err {
        OttoError::BatchTooLarge { received, limit } => {
            assert_eq!(received, 150);
            assert_eq!(limit, 100);
        }
        other => panic!("expected BatchTooLarge, got {other:?}"),
    }
    assert!(receiver.try_recv().is_err(), "nothing should have been enqueued");
}
