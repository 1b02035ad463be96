//! C3 - Dedupe Store (spec.md §4.3).
//!
//! A capability with exactly three operations. `mark_if_new` is the only one
//! that matters for correctness: it must be a single-round-trip
//! compare-and-set so that concurrent callers racing on the same key see
//! exactly one `true`. Grounded on the teacher's `CacheManager::acquire_lock`
//! (Redis `SET NX EX` as an atomic claim) generalized from a named lock to
//! an arbitrary dedupe key, plus `UserRepo::create`'s
//! `ON CONFLICT` pattern for the Postgres variant.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool as RedisPool;
use tokio::time::Instant;

use crate::error::StoreResult;

#[async_trait]
pub trait DedupeStore: Send + Sync {
    /// Atomically claim `key` for `ttl`. Returns `true` the first time any
    /// caller claims a given key, `false` on every subsequent call until it
    /// expires.
    async fn mark_if_new(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    async fn is_duplicate(&self, key: &str) -> StoreResult<bool>;

    /// Test-only: force-clear a key.
    async fn clear(&self, key: &str) -> StoreResult<()>;
}

/// In-memory dedupe store (dev only; spec.md §6 rejects this in staging/production).
#[derive(Default)]
pub struct MemoryDedupeStore {
    entries: DashMap<String, Instant>,
}

impl MemoryDedupeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupeStore for MemoryDedupeStore {
    async fn mark_if_new(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut was_new = false;
        self.entries
            .entry(key.to_string())
            .and_modify(|expires_at| {
                if *expires_at <= now {
                    *expires_at = now + ttl;
                    was_new = true;
                }
            })
            .or_insert_with(|| {
                was_new = true;
                now + ttl
            });
        Ok(was_new)
    }

    async fn is_duplicate(&self, key: &str) -> StoreResult<bool> {
        match self.entries.get(key) {
            Some(expires_at) => Ok(*expires_at > Instant::now()),
            None => Ok(false),
        }
    }

    async fn clear(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis-backed dedupe store for staging/production (spec.md §4.3).
pub struct RedisDedupeStore {
    pool: RedisPool,
}

impl RedisDedupeStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DedupeStore for RedisDedupeStore {
    async fn mark_if_new(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let claimed: Option<String> = deadpool_redis::redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(claimed.is_some())
    }

    async fn is_duplicate(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn clear(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}

/// Document-store fallback (spec.md §4.3 "document store with expires-at
/// field"). No Firestore client exists anywhere in the reference pack; this
/// substitutes a Postgres table with the same `{key, expires_at}` shape and
/// native TTL sweep replaced by an `expires_at` predicate (see DESIGN.md).
pub struct DocumentDedupeStore {
    pool: sqlx::PgPool,
}

impl DocumentDedupeStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DedupeStore for DocumentDedupeStore {
    async fn mark_if_new(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO otto_dedupe_entries (key, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE
                SET expires_at = EXCLUDED.expires_at
                WHERE otto_dedupe_entries.expires_at <= now()
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(claimed.is_some())
    }

    async fn is_duplicate(&self, key: &str) -> StoreResult<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT key FROM otto_dedupe_entries WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn clear(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM otto_dedupe_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub type SharedDedupeStore = Arc<dyn DedupeStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_claims_key_exactly_once() {
        let store = MemoryDedupeStore::new();
        assert!(store.mark_if_new("inbound:m1", Duration::from_secs(60)).await.unwrap());
        assert!(!store.mark_if_new("inbound:m1", Duration::from_secs(60)).await.unwrap());
        assert!(store.is_duplicate("inbound:m1").await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_reclaims_after_expiry() {
        let store = MemoryDedupeStore::new();
        assert!(store.mark_if_new("k", Duration::from_millis(1)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.mark_if_new("k", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn clear_allows_reclaiming_immediately() {
        let store = MemoryDedupeStore::new();
        store.mark_if_new("k", Duration::from_secs(60)).await.unwrap();
        store.clear("k").await.unwrap();
        assert!(store.mark_if_new("k", Duration::from_secs(60)).await.unwrap());
    }
}
