//! C5 - Session Manager (spec.md §4.5).

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use otto_fsm::State as FsmState;
use otto_store::SharedSessionStore;
use otto_types::{HistoryEntry, NormalizedMessage, Session};
use uuid::Uuid;

/// Fixed namespace used to derive a stable session id from a sender's
/// address when the vendor envelope carries no distinct `chat_id`
/// (spec.md §4.5 "use `chat-id` ... else derive a new session-id").
const SESSION_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x74, 0x74, 0x6f, 0x2d, 0x73, 0x65, 0x73, 0x73, 0x69, 0x6f, 0x6e, 0x2d, 0x76, 0x35, 0x00,
]);

fn derive_session_id(message: &NormalizedMessage) -> Uuid {
    let key = message.chat_id.as_deref().unwrap_or(message.sender_address.as_str());
    Uuid::new_v5(&SESSION_ID_NAMESPACE, key.as_bytes())
}

/// Public form of [`derive_session_id`], so callers that need to key a
/// per-session lease (spec.md §4.13 "steps c-m ... serialized by a
/// per-session lease") can do so before ever touching the session store.
pub fn session_id_for(message: &NormalizedMessage) -> Uuid {
    derive_session_id(message)
}

pub struct SessionManager {
    store: SharedSessionStore,
    ttl: Duration,
    max_history_entries: usize,
}

impl SessionManager {
    pub fn new(store: SharedSessionStore, ttl: Duration, max_history_entries: usize) -> Self {
        Self { store, ttl, max_history_entries }
    }

    /// Load the session keyed off the message, creating one at the FSM's
    /// canonical initial state if none exists yet.
    pub async fn get_or_create(&self, message: &NormalizedMessage) -> otto_store::StoreResult<Session> {
        let session_id = derive_session_id(message);
        if let Some(existing) = self.store.load(session_id).await? {
            return Ok(existing);
        }
        Ok(Session::new(session_id, FsmState::Init.as_str()))
    }

    /// Append a compact history record for `message`, de-duplicating by
    /// `message_id` and pruning the oldest entries past the configured cap.
    /// Returns whether a new entry was actually appended (spec.md §4.13 step
    /// c: "if the message-id was already in history, treat as retry").
    pub fn append_user_message(&self, session: &mut Session, message: &NormalizedMessage) -> bool {
        if session.has_seen_message(&message.message_id) {
            return false;
        }

        session.message_history.push(HistoryEntry {
            received_at: Utc::now(),
            message_id: message.message_id.clone(),
            summary: None,
        });

        let previous_len = session.message_history.len();
        if previous_len > self.max_history_entries {
            let overflow = previous_len - self.max_history_entries;
            session.message_history.drain(0..overflow);
            tracing::info!(
                event = "session_history_pruned",
                session_id = %session.session_id,
                previous_len,
                new_len = session.message_history.len(),
            );
        }

        session.updated_at = Utc::now();
        true
    }

    /// Validate `session.current_state` against the FSM alphabet, resetting
    /// to the canonical initial state and logging on drift.
    pub fn normalize_current_state(&self, session: &mut Session) -> FsmState {
        match FsmState::from_str(&session.current_state) {
            Some(state) => state,
            None => {
                tracing::error!(
                    event = "invalid_state_normalized",
                    session_id = %session.session_id,
                    raw_state = session.current_state.as_str(),
                );
                session.current_state = FsmState::Init.as_str().to_string();
                FsmState::Init
            }
        }
    }

    /// True iff no prior history entry falls on the same UTC calendar day as `ts`.
    pub fn is_first_message_of_day(&self, session: &Session, ts: DateTime<Utc>) -> bool {
        !session
            .message_history
            .iter()
            .any(|entry| same_utc_day(entry.received_at, ts))
    }

    pub async fn persist(&self, session: &Session, is_terminal_state: bool) -> otto_store::StoreResult<()> {
        self.store.save(session, self.ttl, is_terminal_state).await
    }
}

fn same_utc_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.ordinal() == b.ordinal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use otto_store::MemorySessionStore;
    use std::sync::Arc;

    fn text_message(id: &str) -> NormalizedMessage {
        NormalizedMessage::new(
            id,
            "+5511999999999",
            1_700_000_000,
            otto_types::MessageContent::Text { body: "oi".into() },
            None,
        )
        .unwrap()
    }

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemorySessionStore::new()), Duration::from_secs(7200), 3)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_for_same_sender() {
        let mgr = manager();
        let msg = text_message("m1");
        let a = mgr.get_or_create(&msg).await.unwrap();
        mgr.persist(&a, false).await.unwrap();
        let b = mgr.get_or_create(&text_message("m2")).await.unwrap();
        assert_eq!(a.session_id, b.session_id);
    }

    #[test]
    fn append_user_message_deduplicates_by_message_id() {
        let mgr = manager();
        let mut session = Session::new(Uuid::new_v4(), "INIT");
        assert!(mgr.append_user_message(&mut session, &text_message("m1")));
        assert!(!mgr.append_user_message(&mut session, &text_message("m1")));
        assert_eq!(session.message_history.len(), 1);
    }

    #[test]
    fn append_user_message_prunes_oldest_past_cap() {
        let mgr = manager();
        let mut session = Session::new(Uuid::new_v4(), "INIT");
        for i in 0..5 {
            mgr.append_user_message(&mut session, &text_message(&format!("m{i}")));
        }
        assert_eq!(session.message_history.len(), 3);
        assert_eq!(session.message_history[0].message_id, "m2");
    }

    #[test]
    fn normalize_current_state_resets_unknown_state() {
        let mgr = manager();
        let mut session = Session::new(Uuid::new_v4(), "NOT_A_STATE");
        let state = mgr.normalize_current_state(&mut session);
        assert_eq!(state, FsmState::Init);
        assert_eq!(session.current_state, "INIT");
    }
}
