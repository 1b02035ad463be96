//! C12 (decision audit half) - best-effort, append-only record of every
//! pipeline execution, keyed by correlation-id (spec.md §4.12, §3
//! DecisionAuditRecord). Unlike the user audit log this is not chained;
//! failures are logged but never fail the pipeline (spec.md §7).

use async_trait::async_trait;
use dashmap::DashMap;
use otto_types::DecisionAuditRecord;

use crate::error::AuditResult;

#[async_trait]
pub trait DecisionAuditLog: Send + Sync {
    async fn append(&self, record: DecisionAuditRecord) -> AuditResult<()>;
    async fn get(&self, correlation_id: &str) -> AuditResult<Option<DecisionAuditRecord>>;
}

/// Append a decision audit record, logging (not propagating) any failure -
/// the authoritative policy is "best-effort" (spec.md §4.12, §7).
pub async fn append_best_effort(log: &dyn DecisionAuditLog, record: DecisionAuditRecord) {
    let correlation_id = record.correlation_id.clone();
    if let Err(err) = log.append(record).await {
        tracing::error!(correlation_id = %correlation_id, error = %err, "decision_audit_append_failed");
    }
}

#[derive(Default)]
pub struct MemoryDecisionAuditLog {
    records: DashMap<String, DecisionAuditRecord>,
}

impl MemoryDecisionAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DecisionAuditLog for MemoryDecisionAuditLog {
    async fn append(&self, record: DecisionAuditRecord) -> AuditResult<()> {
        self.records.insert(record.correlation_id.clone(), record);
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> AuditResult<Option<DecisionAuditRecord>> {
        Ok(self.records.get(correlation_id).map(|r| r.clone()))
    }
}

/// Postgres-backed decision audit collection keyed by correlation-id
/// (spec.md §6 "Persisted layouts").
pub struct PostgresDecisionAuditLog {
    pool: sqlx::PgPool,
}

impl PostgresDecisionAuditLog {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionAuditLog for PostgresDecisionAuditLog {
    async fn append(&self, record: DecisionAuditRecord) -> AuditResult<()> {
        let body = serde_json::to_value(&record)?;
        sqlx::query(
            r#"
            INSERT INTO otto_decision_audit (correlation_id, body)
            VALUES ($1, $2)
            ON CONFLICT (correlation_id) DO UPDATE SET body = EXCLUDED.body
            "#,
        )
        .bind(&record.correlation_id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> AuditResult<Option<DecisionAuditRecord>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT body FROM otto_decision_audit WHERE correlation_id = $1")
                .bind(correlation_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(match row {
            Some((body,)) => Some(serde_json::from_value(body)?),
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_record(correlation_id: &str) -> DecisionAuditRecord {
        DecisionAuditRecord {
            correlation_id: correlation_id.to_string(),
            final_state: "AWAITING_USER".to_string(),
            apply_state: true,
            selected_response_index: 0,
            message_kind: "text".to_string(),
            overall_confidence: 0.9,
            reason: "ok".to_string(),
            state_selector: None,
            response_generator: None,
            master_decision: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_by_correlation_id() {
        let log = MemoryDecisionAuditLog::new();
        append_best_effort(&log, sample_record("corr-1")).await;
        let fetched = log.get("corr-1").await.unwrap().unwrap();
        assert_eq!(fetched.final_state, "AWAITING_USER");
    }

    #[tokio::test]
    async fn missing_correlation_id_returns_none() {
        let log = MemoryDecisionAuditLog::new();
        assert!(log.get("nope").await.unwrap().is_none());
    }
}
