//! The ingestion gate: validate, rate-limit, stamp, persist.
//!
//! The gate is the only component that touches shared mutable state. It
//! enforces two independent abuse controls with different failure policies:
//! the per-reporter cooldown is authoritative and fails closed (a store
//! failure rejects the submission), while the anonymous volume limiter fails
//! open (a limiter failure alone never blocks a legitimate submission).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::config::GateConfig;
use crate::db::repository::{CooldownOutcome, FullRepository, RepositoryError};
use crate::models::Report;
use crate::services::rate_limit::{window_key, window_start, RateDecision, RateLimiter};
use crate::services::validation::{self, ReportSubmission, ValidationError};

/// Non-identifying request context captured alongside a report.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    /// Coarse network origin (forwarded address), if known.
    pub origin: Option<String>,
    /// Client agent string, if sent.
    pub agent: Option<String>,
}

/// Gate failures, grouped by how the client should react.
///
/// Validation errors mean "fix your input", abuse rejections mean "wait and
/// retry", availability errors mean "try again later" — the write may not
/// have happened and is safe to retry.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a report for this location from this reporter is still in cooldown")]
    TooSoon { retry_after: Duration },
    #[error("submission volume limit reached for this client")]
    VolumeLimited { retry_after: Duration },
    #[error("report store unavailable")]
    Unavailable(#[source] RepositoryError),
    #[error("report store failure")]
    Store(#[source] RepositoryError),
}

impl GateError {
    /// Stable machine-readable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::TooSoon { .. } => "too_soon",
            Self::VolumeLimited { .. } => "rate_limited",
            Self::Unavailable(_) => "store_unavailable",
            Self::Store(_) => "store_error",
        }
    }

    /// Retry hint in seconds for abuse-control rejections.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::TooSoon { retry_after } | Self::VolumeLimited { retry_after } => {
                // At least one second so clients do not hot-loop
                Some(retry_after.as_secs().max(1))
            }
            _ => None,
        }
    }
}

fn classify_store_error(error: RepositoryError) -> GateError {
    if error.is_retryable() {
        GateError::Unavailable(error)
    } else {
        GateError::Store(error)
    }
}

/// The rate-limited report ingestion gate.
pub struct IngestionGate {
    repository: Arc<dyn FullRepository>,
    limiter: Arc<dyn RateLimiter>,
    config: GateConfig,
}

impl IngestionGate {
    pub fn new(
        repository: Arc<dyn FullRepository>,
        limiter: Arc<dyn RateLimiter>,
        config: GateConfig,
    ) -> Self {
        Self {
            repository,
            limiter,
            config,
        }
    }

    /// Accept a candidate report.
    ///
    /// Order of operations: pure validation first (no I/O), then the
    /// anonymous volume limiter, then the atomic cooldown-checked append.
    /// On success the persisted report is returned, including the
    /// server-assigned id and timestamp.
    pub async fn submit(
        &self,
        submission: ReportSubmission,
        context: &ClientContext,
    ) -> Result<Report, GateError> {
        let valid = validation::validate(submission)?;
        let now = Utc::now();

        // Layer 2: anonymous volume limiter, keyed by hashed client identity
        // per fixed window. Fails open: an unreachable limiter logs and
        // proceeds rather than blocking legitimate traffic.
        let origin = context.origin.as_deref().unwrap_or("unknown");
        let agent = context.agent.as_deref().unwrap_or("unknown");
        let key = window_key(origin, agent, window_start(now, self.config.volume_window));
        match self
            .limiter
            .check_and_consume(
                &key,
                self.config.volume_max_per_window,
                self.config.volume_window,
                now,
            )
            .await
        {
            Ok(RateDecision::Allowed) => {}
            Ok(RateDecision::Limited { retry_after }) => {
                return Err(GateError::VolumeLimited { retry_after });
            }
            Err(error) => {
                warn!(error = %error, "volume limiter unavailable, failing open");
            }
        }

        // Server-side stamping: clients never control id or created_at.
        let report = Report {
            id: Uuid::new_v4(),
            location_id: valid.location_id,
            crowd_level: valid.crowd_level,
            water_condition: valid.water_condition,
            beach_condition: valid.beach_condition,
            reporter_hash: valid.reporter_hash,
            created_at: now,
            attribution: valid.attribution,
            client_origin: context.origin.clone(),
            client_agent: context.agent.clone(),
        };

        // Layer 1: per-reporter cooldown, atomic at the store and
        // authoritative. Fails closed: without a store answer the gate
        // cannot claim the write happened.
        let outcome = tokio::time::timeout(
            self.config.store_timeout,
            self.repository
                .append_report_if_cool(&report, self.config.cooldown),
        )
        .await
        .map_err(|_| {
            GateError::Unavailable(RepositoryError::timeout(format!(
                "store did not answer within {:?}",
                self.config.store_timeout
            )))
        })?
        .map_err(classify_store_error)?;

        match outcome {
            CooldownOutcome::Accepted => Ok(report),
            CooldownOutcome::TooSoon { retry_after } => Err(GateError::TooSoon { retry_after }),
        }
    }
}
