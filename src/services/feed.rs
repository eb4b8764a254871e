//! Feed reads: recent reports served to clients.
//!
//! The feed is intentionally thin. It exists so the consensus engine can run
//! client-side or server-side over identical data: a bounded lookback
//! window, most-recent-first, capped at a maximum row count. Reads are
//! idempotent and safe to cancel at any point.

use chrono::{DateTime, Utc};

use crate::config::FeedConfig;
use crate::db::repository::{ReportRepository, RepositoryResult};
use crate::models::Report;

/// Fetch one location's reports inside the feed window.
pub async fn recent_reports_for_location(
    repository: &dyn ReportRepository,
    location_id: &str,
    config: &FeedConfig,
    now: DateTime<Utc>,
) -> RepositoryResult<Vec<Report>> {
    let since = now
        - chrono::Duration::from_std(config.lookback).unwrap_or_else(|_| chrono::Duration::hours(6));
    repository
        .fetch_reports_for_location(location_id, since, config.max_rows)
        .await
}

/// Fetch reports across all locations inside the feed window.
///
/// Callers computing many snapshots group the result by location in a single
/// pass instead of issuing one read per location.
pub async fn recent_reports(
    repository: &dyn ReportRepository,
    config: &FeedConfig,
    now: DateTime<Utc>,
) -> RepositoryResult<Vec<Report>> {
    let since = now
        - chrono::Duration::from_std(config.lookback).unwrap_or_else(|_| chrono::Duration::hours(6));
    repository.fetch_recent_reports(since, config.max_rows).await
}
