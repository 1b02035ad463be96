//! C4 - Session Store (spec.md §4.4).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool as RedisPool;
use otto_types::{Outcome, Session};
use uuid::Uuid;

use crate::error::StoreResult;

/// Canonical-JSON session serialization plus the terminal-outcome assertion
/// required before any terminal save (spec.md §4.4, §8).
fn prepare_for_save(session: &mut Session, is_terminal_state: bool) {
    if is_terminal_state && !matches!(session.outcome, Some(_)) {
        tracing::error!(
            session_id = %session.session_id,
            "terminal save missing outcome, normalizing to FAILED_INTERNAL"
        );
        session.outcome = Some(Outcome::FailedInternal);
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session, ttl: Duration, is_terminal_state: bool) -> StoreResult<()>;
    async fn load(&self, id: Uuid) -> StoreResult<Option<Session>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    async fn exists(&self, id: Uuid) -> StoreResult<bool>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<Uuid, (Session, tokio::time::Instant)>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &Session, ttl: Duration, is_terminal_state: bool) -> StoreResult<()> {
        let mut session = session.clone();
        prepare_for_save(&mut session, is_terminal_state);
        let expires_at = tokio::time::Instant::now() + ttl;
        self.entries.insert(session.session_id, (session, expires_at));
        Ok(())
    }

    async fn load(&self, id: Uuid) -> StoreResult<Option<Session>> {
        match self.entries.get(&id) {
            Some(entry) if entry.1 > tokio::time::Instant::now() => Ok(Some(entry.0.clone())),
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.entries.remove(&id).is_some())
    }

    async fn exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.load(id).await?.is_some())
    }
}

/// Redis-backed session store: `sessions/{session-id}` serialized as
/// canonical JSON with native TTL (spec.md §6 "Persisted layouts").
pub struct RedisSessionStore {
    pool: RedisPool,
}

impl RedisSessionStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn key(id: Uuid) -> String {
        format!("sessions:{id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session: &Session, ttl: Duration, is_terminal_state: bool) -> StoreResult<()> {
        let mut session = session.clone();
        prepare_for_save(&mut session, is_terminal_state);
        let json = serde_json::to_string(&session)?;
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(Self::key(session.session_id), json, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> StoreResult<Option<Session>> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(Self::key(id)).await?;
        Ok(match raw {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = conn.del(Self::key(id)).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let exists: bool = conn.exists(Self::key(id)).await?;
        Ok(exists)
    }
}

/// Document-store fallback: `sessions/{session-id}` modeled as a Postgres
/// row with a `jsonb` body and an `_ttl_expire_at` column, standing in for
/// the Firestore document the spec describes (see DESIGN.md).
pub struct DocumentSessionStore {
    pool: sqlx::PgPool,
}

impl DocumentSessionStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for DocumentSessionStore {
    async fn save(&self, session: &Session, ttl: Duration, is_terminal_state: bool) -> StoreResult<()> {
        let mut session = session.clone();
        prepare_for_save(&mut session, is_terminal_state);
        let body = serde_json::to_value(&session)?;
        let ttl_expire_at = chrono::Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        sqlx::query(
            r#"
            INSERT INTO otto_sessions (session_id, body, ttl_expire_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id) DO UPDATE
                SET body = EXCLUDED.body, ttl_expire_at = EXCLUDED.ttl_expire_at
            "#,
        )
        .bind(session.session_id)
        .bind(body)
        .bind(ttl_expire_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> StoreResult<Option<Session>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT body FROM otto_sessions WHERE session_id = $1 AND ttl_expire_at > now()",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some((body,)) => Some(serde_json::from_value(body)?),
            None => None,
        })
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM otto_sessions WHERE session_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.load(id).await?.is_some())
    }
}

pub type SharedSessionStore = Arc<dyn SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use otto_types::Outcome;

    #[tokio::test]
    async fn round_trips_a_session() {
        let store = MemorySessionStore::new();
        let session = Session::new(Uuid::new_v4(), "INIT");
        store.save(&session, Duration::from_secs(60), false).await.unwrap();
        let loaded = store.load(session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.session_id, session.session_id);
    }

    #[tokio::test]
    async fn terminal_save_without_outcome_is_normalized() {
        let store = MemorySessionStore::new();
        let session = Session::new(Uuid::new_v4(), "COMPLETED");
        store.save(&session, Duration::from_secs(60), true).await.unwrap();
        let loaded = store.load(session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.outcome, Some(Outcome::FailedInternal));
    }
}
