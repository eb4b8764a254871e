//! Consensus snapshot: the computed, non-persisted summary of a location's
//! current crowd state. Derived on demand, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::{BeachCondition, CrowdLevel, WaterCondition};

/// Freshness classification of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FreshnessState {
    /// Actively reported within the live threshold.
    Live,
    /// Reported recently but aging toward the TTL cutoff.
    Recent,
    /// No observed data at all; pure baseline prediction.
    Pred,
}

/// Per-location consensus over the recent report window.
///
/// A snapshot is a pure function of `(reports for a location, now, params)`:
/// recomputing with the same inputs yields an identical value. Secondary
/// condition axes are present only when at least one contributing report
/// supplied them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusSnapshot {
    pub crowd_level: CrowdLevel,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub water_condition: Option<WaterCondition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub beach_condition: Option<BeachCondition>,
    pub state: FreshnessState,
    /// Confidence in the consensus, in `[0, 1]`.
    pub confidence: f64,
    /// Timestamp of the most recent contributing report, absent when no
    /// report survived the TTL filter.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Number of reports that contributed after TTL filtering.
    pub reports_count: usize,
}

impl ConsensusSnapshot {
    /// Baseline snapshot for a location with no surviving reports.
    ///
    /// Crowd level defaults to the lowest reading and confidence sits at the
    /// configured floor; there is nothing to compute agreement over.
    pub fn baseline(confidence_floor: f64) -> Self {
        Self {
            crowd_level: CrowdLevel::Quiet,
            water_condition: None,
            beach_condition: None,
            state: FreshnessState::Pred,
            confidence: confidence_floor,
            updated_at: None,
            reports_count: 0,
        }
    }
}
