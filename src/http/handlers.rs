//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the service
//! layer for business logic.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use super::dto::{
    BatchSnapshotsResponse, FeedResponse, HealthResponse, PruneQuery, ReportSubmission,
    SnapshotResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::models::Report;
use crate::services::ingestion::{ClientContext, GateError};
use crate::services::validation::ValidationError;
use crate::services::{consensus, feed, retention};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Feed and snapshot reads tolerate short staleness; the consensus already
/// decays over tens of minutes.
const CACHE_CONTROL_FEED: &str = "public, max-age=30, stale-while-revalidate=120";

/// Run a store operation under the configured deadline.
///
/// A read that blows the deadline surfaces as an availability error, never
/// as a silent hang.
async fn with_deadline<T, F>(deadline: std::time::Duration, operation: F) -> Result<T, AppError>
where
    F: std::future::Future<Output = crate::db::repository::RepositoryResult<T>>,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| {
            AppError::Repository(crate::db::repository::RepositoryError::timeout(format!(
                "store did not answer within {:?}",
                deadline
            )))
        })?
        .map_err(AppError::Repository)
}

fn client_context(headers: &HeaderMap) -> ClientContext {
    // Behind the reverse proxy the socket peer is the proxy itself; the
    // first hop of X-Forwarded-For carries the client.
    let origin = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty());

    ClientContext { origin, agent }
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint to verify the service is running and the report
/// store is accessible.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository.health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Report Submission
// =============================================================================

/// POST /v1/reports
///
/// Submit a crowd report. Returns the normalized, persisted report with the
/// server-assigned id and timestamp.
pub async fn submit_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ReportSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Report>), AppError> {
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            // The body never parsed; classify before the gate sees anything
            let error = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ValidationError::PayloadTooLarge
            } else {
                ValidationError::InvalidBody(rejection.body_text())
            };
            return Err(AppError::Gate(GateError::Validation(error)));
        }
    };

    let context = client_context(&headers);
    let report = state.gate.submit(submission, &context).await?;

    Ok((StatusCode::CREATED, Json(report)))
}

// =============================================================================
// Feed & Snapshots
// =============================================================================

/// GET /v1/locations/{location_id}/reports
///
/// Recent reports for one location, newest first, bounded by the feed
/// lookback window and row cap.
pub async fn get_location_reports(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let reports = with_deadline(
        state.config.gate.store_timeout,
        feed::recent_reports_for_location(
            state.repository.as_ref(),
            &location_id,
            &state.config.feed,
            Utc::now(),
        ),
    )
    .await?;

    let total = reports.len();
    Ok((
        [(header::CACHE_CONTROL, CACHE_CONTROL_FEED)],
        Json(FeedResponse {
            location_id,
            reports,
            total,
        }),
    ))
}

/// GET /v1/locations/{location_id}/snapshot
///
/// Consensus snapshot for one location, computed server-side from the feed
/// window.
pub async fn get_location_snapshot(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let reports = with_deadline(
        state.config.gate.store_timeout,
        feed::recent_reports_for_location(
            state.repository.as_ref(),
            &location_id,
            &state.config.feed,
            now,
        ),
    )
    .await?;

    let snapshot = consensus::compute_snapshot(&reports, now, &state.config.consensus);

    Ok((
        [(header::CACHE_CONTROL, CACHE_CONTROL_FEED)],
        Json(SnapshotResponse {
            location_id,
            snapshot,
            generated_at: now,
        }),
    ))
}

/// GET /v1/snapshots
///
/// Consensus snapshots for every location with reports inside the feed
/// window. The batch is grouped by location in a single pass.
pub async fn get_snapshots(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let reports = with_deadline(
        state.config.gate.store_timeout,
        feed::recent_reports(state.repository.as_ref(), &state.config.feed, now),
    )
    .await?;

    let snapshots = consensus::compute_snapshots(&reports, now, &state.config.consensus);

    Ok((
        [(header::CACHE_CONTROL, CACHE_CONTROL_FEED)],
        Json(BatchSnapshotsResponse {
            snapshots,
            generated_at: now,
        }),
    ))
}

// =============================================================================
// Retention (privileged)
// =============================================================================

/// POST /v1/admin/prune
///
/// Delete reports older than the retention window. Requires the admin bearer
/// token; `?dry_run=true` reports the candidate count without mutating.
pub async fn prune_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PruneQuery>,
) -> HandlerResult<retention::PruneOutcome> {
    let expected = state
        .config
        .retention
        .admin_token
        .as_deref()
        .ok_or_else(|| AppError::Forbidden("pruning is not enabled".to_string()))?;

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented != Some(expected) {
        return Err(AppError::Forbidden("invalid admin token".to_string()));
    }

    let outcome = retention::prune_reports(
        state.repository.as_ref(),
        state.config.retention.retention,
        query.dry_run,
        Utc::now(),
    )
    .await?;

    Ok(Json(outcome))
}
