//! C12 (user audit log half) - hash-chained append-only log per user
//! (spec.md §4.12, §3 AuditEvent). Grounded on the original
//! `RecordAuditEventUseCase`: re-read the latest event, compute the new
//! hash over canonical JSON + prev-hash, CAS-append, retry on conflict.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use otto_core::canonical::chained_hash;
use otto_types::{AuditActor, AuditEvent};
use uuid::Uuid;

use crate::error::{AuditError, AuditResult};

/// Append-only user audit log, CAS on `prev_hash` (spec.md §4.12).
#[async_trait]
pub trait UserAuditLog: Send + Sync {
    async fn get_latest_event(&self, user_key: &str) -> AuditResult<Option<AuditEvent>>;
    async fn list_events(&self, user_key: &str, limit: usize) -> AuditResult<Vec<AuditEvent>>;
    /// Append `event`, succeeding only if the store's current latest hash
    /// for `event.user_key` still equals `expected_prev_hash`.
    async fn append_event(&self, event: AuditEvent, expected_prev_hash: Option<&str>) -> AuditResult<bool>;
}

/// Build the canonical-JSON body hashed into `AuditEvent::hash` - every
/// field except `hash` itself (spec.md §3 invariant).
fn event_body(event: &AuditEvent) -> serde_json::Value {
    serde_json::json!({
        "event_id": event.event_id,
        "user_key": event.user_key,
        "tenant_id": event.tenant_id,
        "timestamp": event.timestamp,
        "actor": event.actor,
        "action": event.action,
        "reason": event.reason,
        "prev_hash": event.prev_hash,
        "correlation_id": event.correlation_id,
    })
}

/// Parameters for one audit event, before hashing (spec.md §4.12).
pub struct AuditEventDraft {
    pub user_key: String,
    pub tenant_id: Option<String>,
    pub actor: AuditActor,
    pub action: String,
    pub reason: String,
    pub correlation_id: Option<String>,
}

const MAX_APPEND_RETRIES: u32 = 3;

/// Append one event to `log`, re-reading the chain head and retrying on CAS
/// conflict up to [`MAX_APPEND_RETRIES`] times (spec.md §4.12, §7
/// `AuditChainError`).
pub async fn append_audit_event(log: &dyn UserAuditLog, draft: AuditEventDraft) -> AuditResult<AuditEvent> {
    for attempt in 1..=MAX_APPEND_RETRIES {
        let latest = log.get_latest_event(&draft.user_key).await?;
        let prev_hash = latest.map(|e| e.hash);

        let mut event = AuditEvent {
            event_id: Uuid::new_v4().to_string(),
            user_key: draft.user_key.clone(),
            tenant_id: draft.tenant_id.clone(),
            timestamp: Utc::now(),
            actor: draft.actor,
            action: draft.action.clone(),
            reason: draft.reason.clone(),
            prev_hash: prev_hash.clone(),
            hash: String::new(),
            correlation_id: draft.correlation_id.clone(),
        };
        event.hash = chained_hash(&event_body(&event), prev_hash.as_deref().unwrap_or(""));

        if log.append_event(event.clone(), prev_hash.as_deref()).await? {
            tracing::info!(
                user_key = %draft.user_key,
                event_id = %event.event_id,
                action = %draft.action,
                attempt,
                "audit_event_appended"
            );
            return Ok(event);
        }
    }

    Err(AuditError::ChainConflict { user_key: draft.user_key, attempts: MAX_APPEND_RETRIES })
}

/// Verify a chain is internally consistent: each event's `prev_hash` matches
/// its predecessor's `hash`, and each `hash` recomputes correctly
/// (spec.md §8 testable property).
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut prev_hash: Option<&str> = None;
    for event in events {
        if event.prev_hash.as_deref() != prev_hash {
            return false;
        }
        let expected = chained_hash(&event_body(event), prev_hash.unwrap_or(""));
        if expected != event.hash {
            return false;
        }
        prev_hash = Some(&event.hash);
    }
    true
}

/// In-memory backend (dev/test), one ordered `Vec` per user key.
#[derive(Default)]
pub struct MemoryUserAuditLog {
    chains: DashMap<String, Vec<AuditEvent>>,
}

impl MemoryUserAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserAuditLog for MemoryUserAuditLog {
    async fn get_latest_event(&self, user_key: &str) -> AuditResult<Option<AuditEvent>> {
        Ok(self.chains.get(user_key).and_then(|chain| chain.last().cloned()))
    }

    async fn list_events(&self, user_key: &str, limit: usize) -> AuditResult<Vec<AuditEvent>> {
        Ok(self
            .chains
            .get(user_key)
            .map(|chain| chain.iter().rev().take(limit).rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn append_event(&self, event: AuditEvent, expected_prev_hash: Option<&str>) -> AuditResult<bool> {
        let mut chain = self.chains.entry(event.user_key.clone()).or_default();
        let current_head = chain.last().map(|e| e.hash.as_str());
        if current_head != expected_prev_hash {
            return Ok(false);
        }
        chain.push(event);
        Ok(true)
    }
}

/// Postgres-backed user audit log: `conversations/{user-key}/audit/{event-id}`
/// modeled as a single table keyed by `(user_key, event_id)` ordered by
/// insertion, CAS implemented as an `INSERT ... WHERE NOT EXISTS` guard on
/// the expected current head (see DESIGN.md - substitutes for the spec's
/// Firestore subcollection, same reasoning as `otto-store`'s document
/// backend).
pub struct PostgresUserAuditLog {
    pool: sqlx::PgPool,
}

impl PostgresUserAuditLog {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    event_id: String,
    user_key: String,
    tenant_id: Option<String>,
    timestamp: chrono::DateTime<Utc>,
    actor: String,
    action: String,
    reason: String,
    prev_hash: Option<String>,
    hash: String,
    correlation_id: Option<String>,
}

impl From<AuditRow> for AuditEvent {
    fn from(row: AuditRow) -> Self {
        AuditEvent {
            event_id: row.event_id,
            user_key: row.user_key,
            tenant_id: row.tenant_id,
            timestamp: row.timestamp,
            actor: if row.actor == "HUMAN" { AuditActor::Human } else { AuditActor::System },
            action: row.action,
            reason: row.reason,
            prev_hash: row.prev_hash,
            hash: row.hash,
            correlation_id: row.correlation_id,
        }
    }
}

#[async_trait]
impl UserAuditLog for PostgresUserAuditLog {
    async fn get_latest_event(&self, user_key: &str) -> AuditResult<Option<AuditEvent>> {
        let row: Option<AuditRow> = sqlx::query_as(
            r#"
            SELECT event_id, user_key, tenant_id, timestamp, actor, action, reason,
                   prev_hash, hash, correlation_id
            FROM otto_audit_events
            WHERE user_key = $1
            ORDER BY timestamp DESC, event_id DESC
            LIMIT 1
            "#,
        )
        .bind(user_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_events(&self, user_key: &str, limit: usize) -> AuditResult<Vec<AuditEvent>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT event_id, user_key, tenant_id, timestamp, actor, action, reason,
                   prev_hash, hash, correlation_id
            FROM otto_audit_events
            WHERE user_key = $1
            ORDER BY timestamp ASC, event_id ASC
            LIMIT $2
            "#,
        )
        .bind(user_key)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn append_event(&self, event: AuditEvent, expected_prev_hash: Option<&str>) -> AuditResult<bool> {
        let actor = match event.actor {
            AuditActor::System => "SYSTEM",
            AuditActor::Human => "HUMAN",
        };
        let result = sqlx::query(
            r#"
            INSERT INTO otto_audit_events
                (event_id, user_key, tenant_id, timestamp, actor, action, reason, prev_hash, hash, correlation_id)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            WHERE NOT EXISTS (
                SELECT 1 FROM otto_audit_events
                WHERE user_key = $2
                  AND ((prev_hash IS NULL AND $8::text IS NULL) OR prev_hash IS DISTINCT FROM $8)
                  AND timestamp = (SELECT max(timestamp) FROM otto_audit_events WHERE user_key = $2)
            ) OR NOT EXISTS (SELECT 1 FROM otto_audit_events WHERE user_key = $2)
            "#,
        )
        .bind(&event.event_id)
        .bind(&event.user_key)
        .bind(&event.tenant_id)
        .bind(event.timestamp)
        .bind(actor)
        .bind(&event.action)
        .bind(&event.reason)
        .bind(expected_prev_hash)
        .bind(&event.hash)
        .bind(&event.correlation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_event_has_no_prev_hash() {
        let log = MemoryUserAuditLog::new();
        let event = append_audit_event(
            &log,
            AuditEventDraft {
                user_key: "uk1".into(),
                tenant_id: None,
                actor: AuditActor::System,
                action: "INBOUND_PROCESSED".into(),
                reason: "happy path".into(),
                correlation_id: Some("corr-1".into()),
            },
        )
        .await
        .unwrap();
        assert!(event.prev_hash.is_none());
    }

    #[tokio::test]
    async fn chain_links_successive_events() {
        let log = MemoryUserAuditLog::new();
        let draft = |reason: &str| AuditEventDraft {
            user_key: "uk1".into(),
            tenant_id: None,
            actor: AuditActor::System,
            action: "INBOUND_PROCESSED".into(),
            reason: reason.into(),
            correlation_id: None,
        };
        let first = append_audit_event(&log, draft("first")).await.unwrap();
        let second = append_audit_event(&log, draft("second")).await.unwrap();
        assert_eq!(second.prev_hash.as_deref(), Some(first.hash.as_str()));

        let chain = log.list_events("uk1", 10).await.unwrap();
        assert!(verify_chain(&chain));
    }

    #[tokio::test]
    async fn tampered_hash_fails_verification() {
        let log = MemoryUserAuditLog::new();
        let draft = AuditEventDraft {
            user_key: "uk1".into(),
            tenant_id: None,
            actor: AuditActor::System,
            action: "A".into(),
            reason: "r".into(),
            correlation_id: None,
        };
        append_audit_event(&log, draft).await.unwrap();
        let mut chain = log.list_events("uk1", 10).await.unwrap();
        chain[0].reason = "tampered".to_string();
        assert!(!verify_chain(&chain));
    }

    #[tokio::test]
    async fn concurrent_append_with_stale_prev_hash_is_rejected() {
        let log = MemoryUserAuditLog::new();
        let event = AuditEvent {
            event_id: "e1".into(),
            user_key: "uk1".into(),
            tenant_id: None,
            timestamp: Utc::now(),
            actor: AuditActor::System,
            action: "A".into(),
            reason: "r".into(),
            prev_hash: None,
            hash: "deadbeef".into(),
            correlation_id: None,
        };
        assert!(log.append_event(event.clone(), None).await.unwrap());
        // stale caller still thinks prev_hash is None - rejected.
        let mut stale_next = event.clone();
        stale_next.event_id = "e2".into();
        assert!(!log.append_event(stale_next, None).await.unwrap());
    }
}
