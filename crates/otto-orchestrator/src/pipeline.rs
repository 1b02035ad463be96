//! C13 - Pipeline Orchestrator (spec.md §4.13). Wires every other component
//! in the fixed order the spec prescribes: one pipeline, not the source's
//! v2/v3/legacy variants (SPEC_FULL.md §9 Open Question resolution,
//! recorded in DESIGN.md).

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use otto_core::{canonical_json, derive_user_key, OrchestratorConfig, OttoError, OttoResult};
use otto_fsm::{possible_next_states, State as FsmState};
use otto_guards::{evaluate as evaluate_guards, FloodDetector, GuardOutcome};
use otto_llm::{
    client::LlmClient, master_decision, master_decision::MasterDecisionInput,
    response_generator, response_generator::ResponseGeneratorInput, state_selector,
    state_selector::StateSelectorInput,
};
use otto_sanitize::{sanitize, truncate_history, DEFAULT_HISTORY_TRUNCATION};
use otto_session::SessionManager;
use otto_store::{DedupeStore, SharedDedupeStore};
use otto_types::{
    AuditActor, DecisionAuditRecord, DedupeNamespace, MessageContent, NormalizedMessage, Outcome,
};
use sha2::{Digest, Sha256};

use crate::lease::SessionLeaseMap;
use crate::outbound::{OutboundJob, OutboundQueue};
use crate::summary::WebhookSummary;

/// Prepended to the day's first outbound reply (spec.md §4.13 step j). The
/// source's locale question is left open (SPEC_FULL.md §9); this is the
/// Portuguese default the response-generator fallback templates already use.
pub const OTTO_INTRO: &str = "Olá! Sou a Otto, assistente virtual.";

/// Per-message deadline (spec.md §5 "default: sum of LLM timeouts + 2s").
const LLM1_TIMEOUT: Duration = Duration::from_secs(5);
const LLM2_TIMEOUT: Duration = Duration::from_secs(8);
const LLM3_TIMEOUT: Duration = Duration::from_secs(5);
const PER_MESSAGE_DEADLINE: Duration = Duration::from_secs(5 + 8 + 5 + 2);
const DEDUPE_IO_TIMEOUT: Duration = Duration::from_millis(300);
const SESSION_IO_TIMEOUT: Duration = Duration::from_millis(500);
const AUDIT_IO_TIMEOUT: Duration = Duration::from_millis(500);

/// Batch size cap across one envelope (spec.md §4.13 step 3).
const MAX_BATCH_SIZE: usize = 100;

fn outcome_for_terminal_state(state: FsmState) -> Option<Outcome> {
    match state {
        FsmState::Escalating => Some(Outcome::HandoffHuman),
        FsmState::Completed => Some(Outcome::SelfServeInfo),
        FsmState::Failed => Some(Outcome::FailedInternal),
        FsmState::Spam => Some(Outcome::DuplicateOrSpam),
        _ => None,
    }
}

fn message_text(content: &MessageContent) -> Option<&str> {
    match content {
        MessageContent::Text { body } => Some(body.as_str()),
        _ => None,
    }
}

fn log_component_latency(component: &'static str, correlation_id: &str, started: Instant) {
    tracing::info!(
        event = "component_latency",
        component,
        correlation_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
    );
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    dedupe_store: SharedDedupeStore,
    session_manager: SessionManager,
    flood_detector: Arc<dyn FloodDetector>,
    llm_client: Arc<dyn LlmClient>,
    user_audit_log: Arc<dyn otto_audit::UserAuditLog>,
    decision_audit_log: Arc<dyn otto_audit::DecisionAuditLog>,
    outbound_queue: Arc<dyn OutboundQueue>,
    leases: SessionLeaseMap,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        dedupe_store: SharedDedupeStore,
        session_manager: SessionManager,
        flood_detector: Arc<dyn FloodDetector>,
        llm_client: Arc<dyn LlmClient>,
        user_audit_log: Arc<dyn otto_audit::UserAuditLog>,
        decision_audit_log: Arc<dyn otto_audit::DecisionAuditLog>,
        outbound_queue: Arc<dyn OutboundQueue>,
    ) -> Self {
        Self {
            config,
            dedupe_store,
            session_manager,
            flood_detector,
            llm_client,
            user_audit_log,
            decision_audit_log,
            outbound_queue,
            leases: SessionLeaseMap::new(),
        }
    }

    /// Entry point for `POST /webhooks/whatsapp` once the raw body has been
    /// parsed to JSON and the signature has already been checked by the
    /// caller (spec.md §4.13 steps 1-2 split across the HTTP edge and here,
    /// matching the teacher's handler/service split).
    pub async fn process_envelope(
        &self,
        envelope: &serde_json::Value,
        correlation_id: &str,
    ) -> OttoResult<WebhookSummary> {
        let total_started = Instant::now();
        let outcome = otto_normalize::normalize_envelope(envelope);

        // Count raw envelope messages, drops included (spec.md §4.13 step 3 /
        // §6: "more than 100 messages across the envelope"), not just the
        // ones that survived normalization.
        let raw_received = outcome.messages.len() + outcome.dropped;
        if raw_received > MAX_BATCH_SIZE {
            return Err(OttoError::BatchTooLarge { received: raw_received, limit: MAX_BATCH_SIZE });
        }

        if outcome.messages.is_empty() {
            let mut summary = WebhookSummary::empty(true, false);
            if outcome.dropped > 0 {
                summary
                    .notes
                    .push(format!("{} message(s) dropped during normalization", outcome.dropped));
            }
            log_component_latency("total", correlation_id, total_started);
            return Ok(summary);
        }

        let mut summary = WebhookSummary::empty(true, false);
        summary.total_received = outcome.messages.len();
        if outcome.dropped > 0 {
            summary
                .notes
                .push(format!("{} message(s) dropped during normalization", outcome.dropped));
        }

        for message in &outcome.messages {
            match self.process_one_message(message, correlation_id).await {
                MessageOutcome::Duplicate => summary.total_deduped += 1,
                MessageOutcome::Processed => summary.total_processed += 1,
                MessageOutcome::ProcessedWithError(reason) => {
                    summary.total_processed += 1;
                    summary.errors.push(format!("{}: {reason}", message.message_id));
                }
            }
        }

        log_component_latency("total", correlation_id, total_started);
        Ok(summary)
    }

    async fn process_one_message(
        &self,
        message: &NormalizedMessage,
        correlation_id: &str,
    ) -> MessageOutcome {
        let dedupe_started = Instant::now();
        let inbound_key = DedupeNamespace::Inbound.key(&message.message_id);
        let claimed = tokio::time::timeout(
            DEDUPE_IO_TIMEOUT,
            self.dedupe_store
                .mark_if_new(&inbound_key, Duration::from_secs(self.config.dedupe_ttl_seconds)),
        )
        .await;
        log_component_latency("dedupe", correlation_id, dedupe_started);

        let claimed = match claimed {
            Ok(Ok(claimed)) => claimed,
            Ok(Err(err)) => {
                tracing::warn!(component = "dedupe", error = %err, "dedupe_store_error_treated_as_new");
                true
            }
            Err(_) => {
                tracing::warn!(component = "dedupe", "dedupe_timeout_treated_as_new");
                true
            }
        };
        if !claimed {
            return MessageOutcome::Duplicate;
        }

        let session_id = otto_session::session_id_for(message);
        let _lease = self.leases.acquire(session_id).await;

        match tokio::time::timeout(
            PER_MESSAGE_DEADLINE,
            self.run_critical_section(message, session_id, correlation_id),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(
                    session_id = %session_id,
                    correlation_id,
                    "per_message_deadline_exceeded"
                );
                MessageOutcome::ProcessedWithError("deadline_exceeded".to_string())
            }
        }
    }

    async fn run_critical_section(
        &self,
        message: &NormalizedMessage,
        session_id: uuid::Uuid,
        correlation_id: &str,
    ) -> MessageOutcome {
        let session_started = Instant::now();
        let mut session = match tokio::time::timeout(
            SESSION_IO_TIMEOUT,
            self.session_manager.get_or_create(message),
        )
        .await
        {
            Ok(Ok(session)) => session,
            _ => {
                tracing::error!(session_id = %session_id, "session_load_failed");
                return MessageOutcome::ProcessedWithError("session_load_failed".to_string());
            }
        };
        log_component_latency("session_load", correlation_id, session_started);

        // Must be evaluated against history as it stood *before* this
        // delivery is appended (spec.md §4.5: "no prior history entry"); the
        // message being processed right now is not itself prior history.
        let is_first_message_of_day =
            self.session_manager.is_first_message_of_day(&session, Utc::now());

        let is_new_to_history = self.session_manager.append_user_message(&mut session, message);
        if !is_new_to_history {
            // History already carries this message-id though the inbound
            // dedupe key expired first: idempotence retry (spec.md §4.13
            // step c). No further work for this delivery.
            return MessageOutcome::Duplicate;
        }

        let guards_started = Instant::now();
        let flood_accepted = self
            .flood_detector
            .check_and_record(&session_id.to_string())
            .await
            .unwrap_or(true);
        let text = message.content.clone();
        let guard_outcome = evaluate_guards(flood_accepted, message_text(&text), &session.intent_queue);
        log_component_latency("guards", correlation_id, guards_started);

        if let GuardOutcome::Rejected(outcome) = guard_outcome {
            session.outcome = Some(outcome);
            if let Err(err) = self.session_manager.persist(&session, true).await {
                tracing::error!(session_id = %session_id, error = %err, "guard_rejection_persist_failed");
            }
            return MessageOutcome::Processed;
        }

        let fsm_started = Instant::now();
        let current_state = self.session_manager.normalize_current_state(&mut session);
        // A terminal state has no outgoing transitions (`possible_next_states`
        // is empty there), but §4.8 requires a non-empty `possible-next-states`
        // input; seed it with the terminal state itself so the contract holds
        // without inventing a transition that doesn't exist.
        let next_states: Vec<String> = {
            let states = possible_next_states(current_state);
            if states.is_empty() {
                vec![current_state.as_str().to_string()]
            } else {
                states.into_iter().map(|s| s.as_str().to_string()).collect()
            }
        };
        log_component_latency("fsm", correlation_id, fsm_started);

        let day_history = truncate_history(&session.message_history, DEFAULT_HISTORY_TRUNCATION);
        let history_summary = day_history
            .iter()
            .filter_map(|entry| entry.summary.as_deref())
            .collect::<Vec<_>>()
            .join(" | ");
        let last_user_message = message_text(&text).unwrap_or("[non-text message]");

        // Open items carried forward from previous turns (spec.md §4.8 input
        // `open-items`): the intents already active/queued on the session.
        let open_items: Vec<String> = session
            .intent_queue
            .active
            .iter()
            .map(|item| item.intent.clone())
            .chain(session.intent_queue.queued.iter().map(|item| item.intent.clone()))
            .collect();
        let fulfilled_items = session.fulfilled_items.clone();

        let llm1_started = Instant::now();
        let state_selector_output = state_selector::select_state(
            self.llm_client.as_ref(),
            StateSelectorInput {
                current_state: current_state.as_str(),
                possible_next_states: &next_states,
                message_text: last_user_message,
                history_summary: &history_summary,
                open_items: &open_items,
                fulfilled_items: &fulfilled_items,
                detected_requests: &[],
            },
            &self.config.llm_thresholds,
            LLM1_TIMEOUT,
            None,
        )
        .await;
        log_component_latency("llm1", correlation_id, llm1_started);

        // Carry the selector's view of the intent queue onto the session for
        // the next turn (spec.md §4.8 outputs `open-items`/`fulfilled-items`/
        // `detected-requests`, §4.6 intent capacity guard): newly detected
        // requests join the queue, fulfilled ones leave it.
        for fulfilled in &state_selector_output.fulfilled_items {
            session.intent_queue.remove_by_intent(fulfilled);
        }
        for detected in &state_selector_output.detected_requests {
            if session.intent_queue.contains(detected) {
                continue;
            }
            if session
                .intent_queue
                .push(otto_types::IntentQueueItem {
                    intent: detected.clone(),
                    queued_at: Utc::now(),
                    confidence: Some(state_selector_output.confidence),
                })
                .is_err()
            {
                tracing::warn!(
                    session_id = %session_id,
                    intent = %detected,
                    "intent_queue_capacity_reached"
                );
            }
        }
        session.fulfilled_items = state_selector_output.fulfilled_items.clone();

        let staged_next_state = if state_selector_output.accepted {
            state_selector_output.next_state.clone()
        } else {
            current_state.as_str().to_string()
        };

        let llm2_started = Instant::now();
        let response_generator_output = response_generator::generate_responses(
            self.llm_client.as_ref(),
            ResponseGeneratorInput {
                state_selector: &state_selector_output,
                current_state: staged_next_state.as_str(),
                last_user_message,
                day_history: &history_summary,
            },
            self.config.llm_thresholds.response_generator_min_responses,
            LLM2_TIMEOUT,
            None,
        )
        .await;
        log_component_latency("llm2", correlation_id, llm2_started);

        let llm3_started = Instant::now();
        let master_decision_output = master_decision::decide(
            self.llm_client.as_ref(),
            MasterDecisionInput {
                last_user_message,
                day_history: &history_summary,
                state_selector: &state_selector_output,
                response_generator: &response_generator_output,
                current_state: staged_next_state.as_str(),
                correlation_id,
            },
            LLM3_TIMEOUT,
            None,
        )
        .await;
        log_component_latency("llm3", correlation_id, llm3_started);

        if master_decision_output.apply_state {
            session.current_state = master_decision_output.final_state.clone();
            if let Some(state) = FsmState::from_str(&master_decision_output.final_state) {
                if let Some(terminal_outcome) = outcome_for_terminal_state(state) {
                    session.outcome = Some(terminal_outcome);
                }
            }
        }

        let mut reply = sanitize(&master_decision_output.selected_response_text);
        if is_first_message_of_day && !reply.starts_with(OTTO_INTRO) {
            reply = format!("{OTTO_INTRO}\n\n{reply}");
        }

        let outbound_started = Instant::now();
        let job = OutboundJob::text(
            message.sender_address.clone(),
            reply,
            message.message_id.clone(),
            correlation_id.to_string(),
            message.message_id.clone(),
        );
        let job_value = serde_json::to_value(&job).unwrap_or(serde_json::Value::Null);
        let mut hasher = Sha256::new();
        hasher.update(canonical_json(&job_value).as_bytes());
        let outbound_hash = hex::encode(hasher.finalize());

        let outbound_claimed = self
            .dedupe_store
            .mark_if_new(
                &DedupeNamespace::Outbound.key(&outbound_hash),
                Duration::from_secs(self.config.dedupe_ttl_seconds),
            )
            .await
            .unwrap_or(true);

        if outbound_claimed {
            if let Err(err) = self.outbound_queue.enqueue(job).await {
                tracing::error!(correlation_id, error = %err, "outbound_enqueue_failed");
            }
        }
        log_component_latency("outbound_build", correlation_id, outbound_started);

        let persist_started = Instant::now();
        let is_terminal = session.outcome.is_some();
        let persisted = tokio::time::timeout(
            SESSION_IO_TIMEOUT,
            self.session_manager.persist(&session, is_terminal),
        )
        .await;
        log_component_latency("persist", correlation_id, persist_started);

        let mut stage_error: Option<String> = None;
        if !matches!(persisted, Ok(Ok(()))) {
            tracing::error!(session_id = %session_id, "session_persist_failed");
            stage_error = Some("session_persist_failed".to_string());
        }

        let decision_record = DecisionAuditRecord {
            correlation_id: correlation_id.to_string(),
            final_state: session.current_state.clone(),
            apply_state: master_decision_output.apply_state,
            selected_response_index: master_decision_output.selected_response_index,
            message_kind: master_decision_output.message_kind.clone(),
            overall_confidence: master_decision_output.overall_confidence,
            reason: master_decision_output.reason.clone(),
            state_selector: Some(state_selector_output),
            response_generator: Some(response_generator_output),
            master_decision: Some(master_decision_output),
            recorded_at: Utc::now(),
        };
        let audit_started = Instant::now();
        let _ = tokio::time::timeout(
            AUDIT_IO_TIMEOUT,
            otto_audit::append_best_effort(self.decision_audit_log.as_ref(), decision_record),
        )
        .await;

        let user_key = derive_user_key(&self.config.user_key_pepper, &message.sender_address);
        let append_result = tokio::time::timeout(
            AUDIT_IO_TIMEOUT,
            otto_audit::append_audit_event(
                self.user_audit_log.as_ref(),
                otto_audit::AuditEventDraft {
                    user_key,
                    tenant_id: None,
                    actor: AuditActor::System,
                    action: "INBOUND_MESSAGE_PROCESSED".to_string(),
                    reason: format!("final_state={}", session.current_state),
                    correlation_id: Some(correlation_id.to_string()),
                },
            ),
        )
        .await;
        log_component_latency("audit", correlation_id, audit_started);

        if !matches!(append_result, Ok(Ok(_))) {
            tracing::error!(correlation_id, "user_audit_append_failed");
            stage_error.get_or_insert_with(|| "audit_chain_error".to_string());
        }

        match stage_error {
            Some(reason) => MessageOutcome::ProcessedWithError(reason),
            None => MessageOutcome::Processed,
        }
    }
}

enum MessageOutcome {
    Duplicate,
    Processed,
    ProcessedWithError(String),
}
