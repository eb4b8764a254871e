//! Data Transfer Objects for the HTTP API.
//!
//! The submission request type lives in the service layer
//! ([`crate::services::validation::ReportSubmission`]) because the gate owns
//! its decoding contract; these DTOs cover the read side and admin
//! operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConsensusSnapshot, Report};

// Re-export the submission contract so HTTP consumers have one import path.
pub use crate::services::validation::ReportSubmission;

/// Feed response: recent reports for one location, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub location_id: String,
    pub reports: Vec<Report>,
    /// Number of rows in `reports`
    pub total: usize,
}

/// Snapshot response for one location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub location_id: String,
    pub snapshot: ConsensusSnapshot,
    /// When this snapshot was computed
    pub generated_at: DateTime<Utc>,
}

/// Batch snapshot response across all recently reported locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSnapshotsResponse {
    pub snapshots: HashMap<String, ConsensusSnapshot>,
    pub generated_at: DateTime<Utc>,
}

/// Query parameters for the prune endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PruneQuery {
    /// Count candidates without deleting (default: false)
    #[serde(default)]
    pub dry_run: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Report store connection status
    pub database: String,
}
