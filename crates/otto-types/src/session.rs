//! §3 Session - conversation context for one sender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};

/// Maximum combined active+queued intents a session may carry (spec.md §3, §8).
pub const MAX_INTENTS: usize = 3;

/// Default cap on `message_history` length before pruning (spec.md §6 default).
pub const DEFAULT_MAX_HISTORY_ENTRIES: usize = 200;

/// Terminal tag attached to a session once its conversation concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    HandoffHuman,
    SelfServeInfo,
    RouteExternal,
    ScheduledFollowup,
    AwaitingUser,
    DuplicateOrSpam,
    Unsupported,
    FailedInternal,
}

/// A classified user need, with at most [`MAX_INTENTS`] held at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentQueueItem {
    pub intent: String,
    pub queued_at: DateTime<Utc>,
    pub confidence: Option<f32>,
}

/// Active intent plus an ordered queue of pending ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentQueue {
    pub active: Option<IntentQueueItem>,
    pub queued: Vec<IntentQueueItem>,
}

impl IntentQueue {
    pub fn len(&self) -> usize {
        self.active.is_some() as usize + self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= MAX_INTENTS
    }

    /// Push a new intent onto the queue, rejecting when already at capacity.
    pub fn push(&mut self, item: IntentQueueItem) -> ValidationResult<()> {
        if self.is_full() {
            return Err(ValidationError::OutOfBounds {
                what: "intent_queue",
                reason: format!("already holds {} of {MAX_INTENTS} intents", self.len()),
            });
        }
        if self.active.is_none() {
            self.active = Some(item);
        } else {
            self.queued.push(item);
        }
        Ok(())
    }

    /// Whether `intent` is already held, active or queued.
    pub fn contains(&self, intent: &str) -> bool {
        self.active.as_ref().is_some_and(|item| item.intent == intent)
            || self.queued.iter().any(|item| item.intent == intent)
    }

    /// Remove a fulfilled intent by name, promoting the next queued item into
    /// the active slot if it was the one removed. Returns whether anything
    /// was removed.
    pub fn remove_by_intent(&mut self, intent: &str) -> bool {
        if self.active.as_ref().is_some_and(|item| item.intent == intent) {
            self.active = if self.queued.is_empty() { None } else { Some(self.queued.remove(0)) };
            return true;
        }
        if let Some(pos) = self.queued.iter().position(|item| item.intent == intent) {
            self.queued.remove(pos);
            return true;
        }
        false
    }
}

/// Free-form facts collected about the lead so far (original_source's
/// `conversations.py` handles partially-collected, evolving data; we keep
/// this open-ended rather than a closed struct).
pub type LeadProfile = serde_json::Map<String, serde_json::Value>;

/// A compact history record - no PII beyond what the sanitizer already masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub received_at: DateTime<Utc>,
    pub message_id: String,
    pub summary: Option<String>,
}

/// Conversation context for one sender (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub lead_profile: LeadProfile,
    #[serde(default)]
    pub intent_queue: IntentQueue,
    /// Intents the State Selector most recently reported as fulfilled,
    /// carried forward as its next `fulfilled-items` input (spec.md §4.8).
    #[serde(default)]
    pub fulfilled_items: Vec<String>,
    pub outcome: Option<Outcome>,
    pub current_state: String,
    #[serde(default)]
    pub message_history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new(session_id: Uuid, initial_state: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            created_at: now,
            updated_at: now,
            lead_profile: LeadProfile::new(),
            intent_queue: IntentQueue::default(),
            fulfilled_items: Vec::new(),
            outcome: None,
            current_state: initial_state.into(),
            message_history: Vec::new(),
        }
    }

    /// True once `message_id` is already present in the history.
    pub fn has_seen_message(&self, message_id: &str) -> bool {
        self.message_history.iter().any(|e| e.message_id == message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_queue_rejects_fourth_intent() {
        let mut q = IntentQueue::default();
        for i in 0..3 {
            q.push(IntentQueueItem {
                intent: format!("intent-{i}"),
                queued_at: Utc::now(),
                confidence: None,
            })
            .unwrap();
        }
        let err = q
            .push(IntentQueueItem {
                intent: "overflow".into(),
                queued_at: Utc::now(),
                confidence: None,
            })
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfBounds { what: "intent_queue", .. }));
    }

    #[test]
    fn remove_by_intent_promotes_next_queued_item() {
        let mut q = IntentQueue::default();
        q.push(IntentQueueItem { intent: "active".into(), queued_at: Utc::now(), confidence: None })
            .unwrap();
        q.push(IntentQueueItem { intent: "next".into(), queued_at: Utc::now(), confidence: None })
            .unwrap();
        assert!(q.remove_by_intent("active"));
        assert_eq!(q.active.as_ref().unwrap().intent, "next");
        assert!(q.queued.is_empty());
    }

    #[test]
    fn contains_checks_both_active_and_queued() {
        let mut q = IntentQueue::default();
        q.push(IntentQueueItem { intent: "a".into(), queued_at: Utc::now(), confidence: None }).unwrap();
        q.push(IntentQueueItem { intent: "b".into(), queued_at: Utc::now(), confidence: None }).unwrap();
        assert!(q.contains("a"));
        assert!(q.contains("b"));
        assert!(!q.contains("c"));
    }

    #[test]
    fn session_has_seen_message_is_idempotent() {
        let mut s = Session::new(Uuid::new_v4(), "INIT");
        s.message_history.push(HistoryEntry {
            received_at: Utc::now(),
            message_id: "m1".into(),
            summary: None,
        });
        assert!(s.has_seen_message("m1"));
        assert!(!s.has_seen_message("m2"));
    }
}
