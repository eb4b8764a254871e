//! Retention pruning of aged-out reports.
//!
//! Reports only influence consensus for minutes, but rows linger for the
//! configured retention period before a privileged job deletes them. Dry-run
//! mode reports the candidate count without mutating anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::repository::{RepositoryResult, RetentionRepository};

/// Result of a pruning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneOutcome {
    /// Reports older than the cutoff at the time of the pass.
    pub candidates: u64,
    /// Rows actually deleted (always 0 in dry-run mode).
    pub deleted: u64,
    pub dry_run: bool,
    pub cutoff: DateTime<Utc>,
}

/// Delete (or count, in dry-run mode) reports older than the retention
/// window.
pub async fn prune_reports(
    repository: &dyn RetentionRepository,
    retention: std::time::Duration,
    dry_run: bool,
    now: DateTime<Utc>,
) -> RepositoryResult<PruneOutcome> {
    let cutoff = now
        - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::days(30));

    let candidates = repository.count_reports_older_than(cutoff).await?;

    let deleted = if dry_run || candidates == 0 {
        0
    } else {
        repository.delete_reports_older_than(cutoff).await?
    };

    info!(candidates, deleted, dry_run, %cutoff, "retention prune pass");

    Ok(PruneOutcome {
        candidates,
        deleted,
        dry_run,
        cutoff,
    })
}
