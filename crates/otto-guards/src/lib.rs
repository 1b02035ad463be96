//! C6 - Abuse Guards (spec.md §4.6).
//!
//! Guard outcomes map onto the session's terminal [`Outcome`] tags: flood,
//! spam and abuse all collapse to `DUPLICATE_OR_SPAM`; a full intent queue
//! maps to `SCHEDULED_FOLLOWUP`. A guard rejection is not an error (spec.md
//! §7 `GuardRejection`) - it sets a terminal outcome and the pipeline moves
//! on to the next message.

pub mod capacity;
pub mod flood;
pub mod spam;

pub use capacity::intent_capacity_exceeded;
pub use flood::{FloodDetector, GuardError, GuardResult, MemoryFloodDetector, RedisFloodDetector};
pub use spam::is_spam;

use otto_types::{IntentQueue, Outcome};

/// Outcome of running every guard for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed,
    Rejected(Outcome),
}

/// Run the non-I/O guards (spam, intent capacity) plus the result of a
/// flood check the caller already performed, and fold them into one
/// decision. Order matches spec.md §4.13 step d: flood first, then spam,
/// then capacity.
pub fn evaluate(
    flood_accepted: bool,
    message_text: Option<&str>,
    intent_queue: &IntentQueue,
) -> GuardOutcome {
    if !flood_accepted {
        return GuardOutcome::Rejected(Outcome::DuplicateOrSpam);
    }
    if let Some(text) = message_text {
        if is_spam(text) {
            return GuardOutcome::Rejected(Outcome::DuplicateOrSpam);
        }
    }
    if capacity::intent_capacity_exceeded(intent_queue) {
        return GuardOutcome::Rejected(Outcome::ScheduledFollowup);
    }
    GuardOutcome::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_rejection_takes_priority() {
        let outcome = evaluate(false, Some("oi"), &IntentQueue::default());
        assert_eq!(outcome, GuardOutcome::Rejected(Outcome::DuplicateOrSpam));
    }

    #[test]
    fn clean_message_with_capacity_is_allowed() {
        let outcome = evaluate(true, Some("oi, tudo bem?"), &IntentQueue::default());
        assert_eq!(outcome, GuardOutcome::Allowed);
    }
}
