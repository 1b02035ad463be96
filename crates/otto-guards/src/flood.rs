//! Flood detector (spec.md §4.6): accept the Nth event iff fewer than
//! `THRESHOLD` events occurred in the last `WINDOW_SECONDS` for this session.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::Pool as RedisPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("flood detector backend error: {0}")]
    Backend(String),
}

pub type GuardResult<T> = std::result::Result<T, GuardError>;

#[async_trait]
pub trait FloodDetector: Send + Sync {
    /// Record one event for `session_id` and report whether it should be
    /// accepted under the sliding window.
    async fn check_and_record(&self, session_id: &str) -> GuardResult<bool>;
}

/// In-memory ring buffer per session (spec.md §4.6 "in-memory ring (dev)").
/// Rejected at startup in staging/production (spec.md §4.6).
pub struct MemoryFloodDetector {
    threshold: u32,
    window: Duration,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl MemoryFloodDetector {
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self { threshold, window, windows: DashMap::new() }
    }
}

#[async_trait]
impl FloodDetector for MemoryFloodDetector {
    async fn check_and_record(&self, session_id: &str) -> GuardResult<bool> {
        let now = Instant::now();
        let mut entry = self.windows.entry(session_id.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) > self.window {
                entry.pop_front();
            } else {
                break;
            }
        }
        let accepted = (entry.len() as u32) < self.threshold;
        entry.push_back(now);
        Ok(accepted)
    }
}

/// Distributed counter-with-TTL flood detector (spec.md §4.6 "prod").
/// Grounded on the teacher's `CacheManager::rate_limit_incr` (INCR + EXPIRE
/// on first hit), generalized from a rate limit to a sliding accept/reject
/// decision over a fixed window.
pub struct RedisFloodDetector {
    pool: RedisPool,
    threshold: u32,
    window: Duration,
}

impl RedisFloodDetector {
    pub fn new(pool: RedisPool, threshold: u32, window: Duration) -> Self {
        Self { pool, threshold, window }
    }
}

#[async_trait]
impl FloodDetector for RedisFloodDetector {
    async fn check_and_record(&self, session_id: &str) -> GuardResult<bool> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GuardError::Backend(e.to_string()))?;
        let key = format!("flood:{session_id}");
        let count: i64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| GuardError::Backend(e.to_string()))?;
        if count == 1 {
            let _: () = conn
                .expire(&key, self.window.as_secs() as i64)
                .await
                .map_err(|e| GuardError::Backend(e.to_string()))?;
        }
        Ok((count as u32) <= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_up_to_threshold_then_rejects() {
        let detector = MemoryFloodDetector::new(3, Duration::from_secs(60));
        assert!(detector.check_and_record("s1").await.unwrap());
        assert!(detector.check_and_record("s1").await.unwrap());
        assert!(detector.check_and_record("s1").await.unwrap());
        assert!(!detector.check_and_record("s1").await.unwrap());
    }

    #[tokio::test]
    async fn independent_sessions_have_independent_windows() {
        let detector = MemoryFloodDetector::new(1, Duration::from_secs(60));
        assert!(detector.check_and_record("a").await.unwrap());
        assert!(detector.check_and_record("b").await.unwrap());
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count() {
        let detector = MemoryFloodDetector::new(1, Duration::from_millis(5));
        assert!(detector.check_and_record("s1").await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(detector.check_and_record("s1").await.unwrap());
    }
}
