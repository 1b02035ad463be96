//! §3 DedupeEntry - namespaced keys for inbound/outbound deduplication.

use serde::{Deserialize, Serialize};

/// Which side of the pipeline a dedupe key belongs to (original_source's
/// `dedupe/manager.py` unifies both under one namespaced-key scheme).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupeNamespace {
    Inbound,
    Outbound,
}

impl DedupeNamespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Inbound => "inbound:",
            Self::Outbound => "outbound:",
        }
    }

    /// Build the namespaced key for a given identifier (message-id for
    /// inbound, canonical-json payload hash for outbound).
    pub fn key(self, identifier: &str) -> String {
        format!("{}{}", self.prefix(), identifier)
    }
}

/// Status of an outbound dedupe entry, tracked explicitly per spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundStatus {
    Pending,
    Sent,
    Failed,
}

/// Backend-internal record; never observed directly by the orchestrator,
/// which only sees `mark_if_new`/`is_duplicate` booleans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeEntry {
    pub key: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub status: Option<OutboundStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_produce_distinct_keys() {
        assert_eq!(DedupeNamespace::Inbound.key("m1"), "inbound:m1");
        assert_eq!(DedupeNamespace::Outbound.key("abc"), "outbound:abc");
    }
}
