//! Per-session lease (spec.md §4.13 Concurrency, §5 "Shared-resource
//! policy"): steps c-m for a given session-id must be serialized. This is
//! the in-process default mentioned in SPEC_FULL.md §4.11 - a
//! `tokio::sync::Mutex` keyed by session-id in a `DashMap`, standing in for
//! the distributed-lock variant the spec also allows (see DESIGN.md).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct SessionLeaseMap {
    leases: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl SessionLeaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lease for `session_id`, creating it on first use. The
    /// returned guard holds the lock for as long as it is alive; entries are
    /// never removed, matching a session-id's lifetime being bounded by the
    /// session TTL rather than by lease churn.
    pub async fn acquire(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = self
            .leases
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_session_id_reuses_the_same_mutex() {
        let leases = SessionLeaseMap::new();
        let id = Uuid::new_v4();
        let guard = leases.acquire(id).await;
        drop(guard);
        let _guard2 = leases.acquire(id).await;
    }

    #[tokio::test]
    async fn distinct_sessions_do_not_block_each_other() {
        let leases = SessionLeaseMap::new();
        let _a = leases.acquire(Uuid::new_v4()).await;
        let _b = leases.acquire(Uuid::new_v4()).await;
    }
}
