//! Intent capacity guard (spec.md §4.6): reject a new distinct intent once
//! `session.intent_queue` already holds the maximum.

use otto_types::IntentQueue;

pub fn intent_capacity_exceeded(queue: &IntentQueue) -> bool {
    queue.is_full()
}

#[cfg(test)]
mod tests {
    use super::*;
    use otto_types::IntentQueueItem;
    use chrono::Utc;

    #[test]
    fn empty_queue_has_capacity() {
        assert!(!intent_capacity_exceeded(&IntentQueue::default()));
    }

    #[test]
    fn full_queue_rejects_new_intents() {
        let mut queue = IntentQueue::default();
        for i in 0..3 {
            queue
                .push(IntentQueueItem { intent: format!("i{i}"), queued_at: Utc::now(), confidence: None })
                .unwrap();
        }
        assert!(intent_capacity_exceeded(&queue));
    }
}
