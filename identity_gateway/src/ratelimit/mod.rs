//! Fixed-window rate limiting over the shared cache store.
//!
//! Buckets self-reset: a bucket whose window has passed reads as fresh, so
//! no eviction pass is needed (redis additionally expires the key). The
//! store lock is held across the read and the write, which is what makes
//! check-and-increment atomic under concurrent requests for the same key.

mod config;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{CacheData, GENERIC_CACHE_STORE};

pub use config::{RATE_LIMIT_MAX_ATTEMPTS, RATE_LIMIT_WINDOW_SECS};

#[derive(Debug, Error, Clone)]
pub enum RateLimitError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Bucket {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Count one attempt against `scope`/`key`, rejecting with the remaining
/// cooldown once `limit` attempts have landed inside the window. `now` is
/// injected so tests never sleep.
pub async fn check_and_increment(
    scope: &str,
    key: &str,
    limit: u32,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<RateLimitDecision, RateLimitError> {
    let prefix = format!("rate_{scope}");

    // Single lock acquisition covers the read-modify-write; two concurrent
    // callers can never both observe a count under the limit.
    let mut store = GENERIC_CACHE_STORE.lock().await;

    let existing = store
        .get(&prefix, key)
        .await
        .map_err(|e| RateLimitError::Storage(e.to_string()))?;

    let mut bucket = existing
        .and_then(|data| serde_json::from_str::<Bucket>(&data.value).ok())
        .filter(|bucket| bucket.window_start + window > now)
        .unwrap_or(Bucket {
            window_start: now,
            count: 0,
        });

    if bucket.count >= limit {
        let retry_after = bucket.window_start + window - now;
        tracing::warn!(scope, "Rate limit hit, retry after {}s", retry_after.num_seconds());
        return Ok(RateLimitDecision::Limited { retry_after });
    }

    bucket.count += 1;
    let value = serde_json::to_string(&bucket)
        .map_err(|e| RateLimitError::Storage(e.to_string()))?;
    store
        .put_with_ttl(&prefix, key, CacheData { value }, window.num_seconds() as usize)
        .await
        .map_err(|e| RateLimitError::Storage(e.to_string()))?;

    Ok(RateLimitDecision::Allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;

    #[tokio::test]
    async fn test_allows_up_to_limit_then_rejects() {
        init_test_environment().await;
        let now = Utc::now();
        let window = Duration::seconds(60);

        for i in 0..3 {
            let decision = check_and_increment("signin", "limit_key", 3, window, now)
                .await
                .unwrap();
            assert!(decision.is_allowed(), "attempt {i} should pass");
        }

        let decision = check_and_increment("signin", "limit_key", 3, window, now)
            .await
            .unwrap();
        match decision {
            RateLimitDecision::Limited { retry_after } => {
                assert!(retry_after > Duration::zero());
                assert!(retry_after <= window);
            }
            RateLimitDecision::Allowed => panic!("fourth attempt should be limited"),
        }
    }

    #[tokio::test]
    async fn test_window_elapse_allows_again() {
        init_test_environment().await;
        let now = Utc::now();
        let window = Duration::seconds(60);

        for _ in 0..2 {
            check_and_increment("signin", "window_key", 2, window, now)
                .await
                .unwrap();
        }
        assert!(
            !check_and_increment("signin", "window_key", 2, window, now)
                .await
                .unwrap()
                .is_allowed()
        );

        // No sleeping: advance the injected clock past the window instead.
        let later = now + Duration::seconds(61);
        assert!(
            check_and_increment("signin", "window_key", 2, window, later)
                .await
                .unwrap()
                .is_allowed()
        );
    }

    #[tokio::test]
    async fn test_scopes_do_not_share_buckets() {
        init_test_environment().await;
        let now = Utc::now();
        let window = Duration::seconds(60);

        check_and_increment("signin", "scope_key", 1, window, now)
            .await
            .unwrap();
        assert!(
            !check_and_increment("signin", "scope_key", 1, window, now)
                .await
                .unwrap()
                .is_allowed()
        );
        assert!(
            check_and_increment("resend", "scope_key", 1, window, now)
                .await
                .unwrap()
                .is_allowed()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_never_exceed_limit() {
        init_test_environment().await;
        let now = Utc::now();
        let window = Duration::seconds(60);
        let limit = 5u32;

        let mut handles = vec![];
        for _ in 0..(limit * 3) {
            handles.push(tokio::spawn(async move {
                check_and_increment("concurrent", "race_key", limit, window, now)
                    .await
                    .unwrap()
                    .is_allowed()
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, limit, "exactly `limit` concurrent calls may pass");
    }
}
