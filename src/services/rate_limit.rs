//! Anonymous volume limiting for low-trust public endpoints.
//!
//! Requests are grouped into fixed time windows keyed by a digest of the
//! client's coarse network origin, agent string, and the window start. Once a
//! window's count exceeds the configured maximum, further requests are
//! rejected until the window rolls over.
//!
//! The limiter is a pluggable strategy: the in-memory implementation is
//! appropriate for a single-process deployment and for tests; any
//! horizontally scaled deployment must use the store-backed implementation so
//! concurrent instances share one atomically updated counter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::db::repository::{FullRepository, RepositoryResult};

/// Outcome of a limiter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Under the limit; the request was counted and may proceed.
    Allowed,
    /// Over the limit for the current window.
    Limited {
        /// Remaining time until the window rolls over.
        retry_after: Duration,
    },
}

/// A volume limiter with a single check-and-consume operation.
///
/// `key` is the pre-hashed window key (see [`window_key`]); `limit` and
/// `window` describe the policy so one limiter instance can serve several
/// endpoints with different budgets.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Atomically count this request against `key` and decide.
    ///
    /// Must be a single check-and-increment: two concurrent calls for the
    /// same key must not both observe "under limit" at the boundary.
    async fn check_and_consume(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RateDecision>;
}

/// Start of the fixed window containing `now`.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window_secs = window.as_secs().max(1) as i64;
    let aligned = now.timestamp().div_euclid(window_secs) * window_secs;
    Utc.timestamp_opt(aligned, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Remaining time in the window containing `now`.
pub fn window_remaining(now: DateTime<Utc>, window: Duration) -> Duration {
    let end = window_start(now, window)
        + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
    end.signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Digest of (client network origin, client agent, window start).
///
/// The raw origin and agent never become a storage key; only the digest
/// travels to the counter table.
pub fn window_key(origin: &str, agent: &str, window_start: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin.as_bytes());
    hasher.update([0x1f]);
    hasher.update(agent.as_bytes());
    hasher.update([0x1f]);
    hasher.update(window_start.timestamp().to_be_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
struct WindowSlot {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// Process-local limiter. Atomic by mutual exclusion; counters die with the
/// process, so this only holds for a non-horizontally-scaled deployment.
#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<String, WindowSlot>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_and_consume(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RateDecision> {
        let expires_at = window_start(now, window)
            + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

        let mut windows = self.windows.lock();
        windows.retain(|_, slot| slot.expires_at > now);

        let slot = windows.entry(key.to_string()).or_insert(WindowSlot {
            count: 0,
            expires_at,
        });
        slot.count += 1;

        if slot.count > limit {
            Ok(RateDecision::Limited {
                retry_after: window_remaining(now, window),
            })
        } else {
            Ok(RateDecision::Allowed)
        }
    }
}

/// Store-backed limiter sharing one atomic counter across server instances.
pub struct StoreRateLimiter {
    repository: Arc<dyn FullRepository>,
}

impl StoreRateLimiter {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl RateLimiter for StoreRateLimiter {
    async fn check_and_consume(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RepositoryResult<RateDecision> {
        let expires_at = window_start(now, window)
            + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

        let count = self
            .repository
            .increment_window_counter(key, expires_at)
            .await?;

        if count > limit {
            Ok(RateDecision::Limited {
                retry_after: window_remaining(now, window),
            })
        } else {
            Ok(RateDecision::Allowed)
        }
    }
}
