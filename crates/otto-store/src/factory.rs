//! §9 Design Notes "polymorphic stores" - resolve the configured backend
//! variant and refuse `memory` in staging/production.

use std::sync::Arc;

use otto_core::{OttoError, OttoResult, StoreBackend};

use crate::dedupe::{DedupeStore, DocumentDedupeStore, MemoryDedupeStore, RedisDedupeStore};
use crate::session::{DocumentSessionStore, MemorySessionStore, RedisSessionStore, SessionStore};

/// Shared pool handles, built once at startup and threaded into every
/// backend factory call.
#[derive(Clone, Default)]
pub struct StorePools {
    pub redis: Option<deadpool_redis::Pool>,
    pub postgres: Option<sqlx::PgPool>,
}

pub fn build_dedupe_store(
    backend: StoreBackend,
    pools: &StorePools,
) -> OttoResult<Arc<dyn DedupeStore>> {
    Ok(match backend {
        StoreBackend::Memory => Arc::new(MemoryDedupeStore::new()),
        StoreBackend::Redis => Arc::new(RedisDedupeStore::new(
            pools
                .redis
                .clone()
                .ok_or_else(|| OttoError::Config("DEDUPE_BACKEND=redis requires REDIS_URL".into()))?,
        )),
        StoreBackend::Firestore => Arc::new(DocumentDedupeStore::new(
            pools.postgres.clone().ok_or_else(|| {
                OttoError::Config("DEDUPE_BACKEND=firestore requires DOCUMENT_STORE_URL".into())
            })?,
        )),
    })
}

pub fn build_session_store(
    backend: StoreBackend,
    pools: &StorePools,
) -> OttoResult<Arc<dyn SessionStore>> {
    Ok(match backend {
        StoreBackend::Memory => Arc::new(MemorySessionStore::new()),
        StoreBackend::Redis => Arc::new(RedisSessionStore::new(
            pools.redis.clone().ok_or_else(|| {
                OttoError::Config("SESSION_STORE_BACKEND=redis requires REDIS_URL".into())
            })?,
        )),
        StoreBackend::Firestore => Arc::new(DocumentSessionStore::new(
            pools.postgres.clone().ok_or_else(|| {
                OttoError::Config("SESSION_STORE_BACKEND=firestore requires DOCUMENT_STORE_URL".into())
            })?,
        )),
    })
}
