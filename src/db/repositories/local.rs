//! In-memory repository for unit testing and single-instance deployments.
//!
//! All state lives behind one `parking_lot` lock, so the cooldown
//! check-and-append and the counter check-and-increment are atomic by mutual
//! exclusion. A horizontally scaled deployment needs the shared Postgres
//! backend instead; nothing here survives a restart.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::super::repository::{
    CooldownOutcome, CounterRepository, HealthRepository, ReportRepository, RepositoryResult,
    RetentionRepository,
};
use crate::models::Report;

#[derive(Debug, Clone)]
struct CounterSlot {
    count: u64,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Store {
    /// Per-location reports, newest first.
    reports_by_location: HashMap<String, Vec<Report>>,
    /// Latest report time per `(location_id, reporter_hash)` pair.
    last_report_at: HashMap<(String, String), DateTime<Utc>>,
    /// Volume-limiter counters by window key.
    counters: HashMap<String, CounterSlot>,
}

/// In-memory implementation of the report store.
#[derive(Debug, Default)]
pub struct LocalRepository {
    inner: RwLock<Store>,
}

impl LocalRepository {
    /// Create an empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored reports across all locations.
    pub fn report_count(&self) -> usize {
        self.inner
            .read()
            .reports_by_location
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl ReportRepository for LocalRepository {
    async fn append_report_if_cool(
        &self,
        report: &Report,
        cooldown: Duration,
    ) -> RepositoryResult<CooldownOutcome> {
        let mut store = self.inner.write();

        let pair = (report.location_id.clone(), report.reporter_hash.clone());
        if let Some(last) = store.last_report_at.get(&pair) {
            let elapsed = report
                .created_at
                .signed_duration_since(*last)
                .to_std()
                .unwrap_or_default();
            if elapsed < cooldown {
                return Ok(CooldownOutcome::TooSoon {
                    retry_after: cooldown - elapsed,
                });
            }
        }

        store.last_report_at.insert(pair, report.created_at);
        let reports = store
            .reports_by_location
            .entry(report.location_id.clone())
            .or_default();
        // Keep newest-first order; fresh appends land at the front, but a
        // crafted older timestamp (tests) still files into position.
        let at = reports
            .partition_point(|existing| existing.created_at > report.created_at);
        reports.insert(at, report.clone());

        Ok(CooldownOutcome::Accepted)
    }

    async fn fetch_reports_for_location(
        &self,
        location_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> RepositoryResult<Vec<Report>> {
        let store = self.inner.read();
        let reports = store
            .reports_by_location
            .get(location_id)
            .map(|reports| {
                reports
                    .iter()
                    .take_while(|r| r.created_at >= since)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(reports)
    }

    async fn fetch_recent_reports(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> RepositoryResult<Vec<Report>> {
        let store = self.inner.read();
        let mut reports: Vec<Report> = store
            .reports_by_location
            .values()
            .flat_map(|reports| reports.iter().take_while(|r| r.created_at >= since))
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports.truncate(limit);
        Ok(reports)
    }
}

#[async_trait]
impl CounterRepository for LocalRepository {
    async fn increment_window_counter(
        &self,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let now = Utc::now();
        let mut store = self.inner.write();
        store.counters.retain(|_, slot| slot.expires_at > now);

        let slot = store
            .counters
            .entry(key.to_string())
            .or_insert(CounterSlot {
                count: 0,
                expires_at,
            });
        slot.count += 1;
        Ok(slot.count)
    }
}

#[async_trait]
impl RetentionRepository for LocalRepository {
    async fn count_reports_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let store = self.inner.read();
        let count = store
            .reports_by_location
            .values()
            .flatten()
            .filter(|r| r.created_at < cutoff)
            .count();
        Ok(count as u64)
    }

    async fn delete_reports_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut store = self.inner.write();
        let mut deleted = 0u64;
        for reports in store.reports_by_location.values_mut() {
            let before = reports.len();
            reports.retain(|r| r.created_at >= cutoff);
            deleted += (before - reports.len()) as u64;
        }
        store.reports_by_location.retain(|_, reports| !reports.is_empty());
        Ok(deleted)
    }
}

#[async_trait]
impl HealthRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}
