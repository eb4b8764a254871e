//! Repository traits for the report store.
//!
//! The store is an append-only report table plus an atomic rate-limit
//! counter primitive. Traits are split by concern so backends can be tested
//! and swapped independently; [`FullRepository`] bundles them for consumers
//! that need the whole store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::Report;

mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

/// Outcome of a cooldown-checked append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownOutcome {
    /// The report was persisted.
    Accepted,
    /// A report from the same `(location, reporter)` pair exists inside the
    /// cooldown window; nothing was written.
    TooSoon {
        /// Time until the pair's cooldown expires.
        retry_after: Duration,
    },
}

/// Repository trait for the append-only report table.
///
/// Reports are immutable once persisted; there are no update operations.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Append a report unless the same `(location_id, reporter_hash)` pair
    /// already has a report younger than `cooldown`.
    ///
    /// The check and the append are a single atomic step with respect to the
    /// pair: two near-simultaneous submissions from the same reporter must
    /// not both be accepted, even across concurrent server instances.
    ///
    /// The cooldown is evaluated against `report.created_at`, which the gate
    /// stamps with server time immediately before calling.
    ///
    /// # Returns
    /// * `Ok(CooldownOutcome::Accepted)` - the report was persisted
    /// * `Ok(CooldownOutcome::TooSoon)` - rejected, with a retry hint
    /// * `Err(RepositoryError)` - the store could not answer; the write must
    ///   be assumed not to have happened
    async fn append_report_if_cool(
        &self,
        report: &Report,
        cooldown: Duration,
    ) -> RepositoryResult<CooldownOutcome>;

    /// Fetch reports for one location created at or after `since`, ordered
    /// most-recent-first, capped at `limit` rows.
    async fn fetch_reports_for_location(
        &self,
        location_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> RepositoryResult<Vec<Report>>;

    /// Fetch reports across all locations created at or after `since`,
    /// ordered most-recent-first, capped at `limit` rows.
    ///
    /// Used for batch snapshot computation; callers group by location in a
    /// single pass rather than issuing one query per location.
    async fn fetch_recent_reports(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> RepositoryResult<Vec<Report>>;
}

/// Repository trait for the atomic rate-limit counter primitive.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Atomically increment the counter for `key` and return the new count.
    ///
    /// This is a single check-and-increment store operation, never a read
    /// followed by a write; two concurrent calls for the same key must
    /// observe distinct counts. `expires_at` lets the backend garbage-collect
    /// counters for windows that have closed.
    async fn increment_window_counter(
        &self,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<u64>;
}

/// Repository trait for retention pruning.
#[async_trait]
pub trait RetentionRepository: Send + Sync {
    /// Count reports created strictly before `cutoff` without mutating.
    async fn count_reports_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;

    /// Delete reports created strictly before `cutoff`, returning the number
    /// of rows removed.
    async fn delete_reports_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64>;
}

/// Repository trait for store health checks.
#[async_trait]
pub trait HealthRepository: Send + Sync {
    /// Verify the store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;
}

/// Complete report store interface.
pub trait FullRepository:
    ReportRepository + CounterRepository + RetentionRepository + HealthRepository
{
}

impl<T> FullRepository for T where
    T: ReportRepository + CounterRepository + RetentionRepository + HealthRepository
{
}
