//! Time-decayed crowd-state consensus.
//!
//! Turns one location's recent reports into a single [`ConsensusSnapshot`].
//! The computation is a pure function of `(reports, now, params)`: no I/O,
//! no hidden state, reproducible bit-for-bit. Recent reports dominate via a
//! continuous exponential decay, so the consensus tracks the last few
//! minutes of activity rather than the whole retention window.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{
    BeachCondition, ConsensusSnapshot, CrowdLevel, FreshnessState, Report, WaterCondition,
};

/// Tuning constants for the consensus computation.
///
/// The defaults are product tuning choices; deployments override them via
/// configuration rather than editing call sites.
#[derive(Debug, Clone)]
pub struct ConsensusParams {
    /// Reports older than this contribute nothing and are discarded.
    pub ttl_minutes: f64,
    /// Decay half-life parameter: `w(age) = exp(-age / half_life)`.
    pub half_life_minutes: f64,
    /// Latest-report age at or below which the snapshot is LIVE.
    pub live_threshold_minutes: f64,
    /// Recency boost fades to zero at this latest-report age.
    pub recency_window_minutes: f64,
    /// Report count at which the volume boost saturates.
    pub volume_target: f64,
    /// Weight of the agreement ratio in the confidence blend.
    pub agreement_weight: f64,
    /// Weight of the volume boost in the confidence blend.
    pub volume_weight: f64,
    /// Weight of the recency boost in the confidence blend.
    pub recency_weight: f64,
    /// Confidence never drops below this floor.
    pub confidence_floor: f64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            ttl_minutes: 30.0,
            half_life_minutes: 18.0,
            live_threshold_minutes: 5.0,
            recency_window_minutes: 45.0,
            volume_target: 10.0,
            agreement_weight: 0.55,
            volume_weight: 0.20,
            recency_weight: 0.10,
            confidence_floor: 0.15,
        }
    }
}

/// Continuous exponential decay weight for a report of the given age.
///
/// Strictly decreasing in age: for ages `a < b`, `weight(a) > weight(b)`.
pub fn decay_weight(age_minutes: f64, half_life_minutes: f64) -> f64 {
    (-age_minutes / half_life_minutes).exp()
}

/// Compute the consensus snapshot for one location's reports.
///
/// `reports` need not be sorted; the engine orders them internally rather
/// than trusting callers to deliver descending recency. Reports older than
/// the TTL are excluded entirely: not counted, not classified.
pub fn compute_snapshot(
    reports: &[Report],
    now: DateTime<Utc>,
    params: &ConsensusParams,
) -> ConsensusSnapshot {
    let refs: Vec<&Report> = reports.iter().collect();
    compute_snapshot_refs(&refs, now, params)
}

/// Compute snapshots for many locations from one batch of reports.
///
/// Groups the batch by `location_id` in a single pass and feeds each group
/// to the engine, avoiding a per-location re-scan of the full report set.
pub fn compute_snapshots(
    reports: &[Report],
    now: DateTime<Utc>,
    params: &ConsensusParams,
) -> HashMap<String, ConsensusSnapshot> {
    let mut by_location: HashMap<&str, Vec<&Report>> = HashMap::new();
    for report in reports {
        by_location
            .entry(report.location_id.as_str())
            .or_default()
            .push(report);
    }

    by_location
        .into_iter()
        .map(|(location_id, group)| {
            (
                location_id.to_string(),
                compute_snapshot_refs(&group, now, params),
            )
        })
        .collect()
}

fn compute_snapshot_refs(
    reports: &[&Report],
    now: DateTime<Utc>,
    params: &ConsensusParams,
) -> ConsensusSnapshot {
    // Recency filter: only reports inside the TTL survive.
    let mut surviving: Vec<(&Report, f64)> = reports
        .iter()
        .map(|r| (*r, r.age_minutes(now)))
        .filter(|(_, age)| *age <= params.ttl_minutes)
        .collect();

    if surviving.is_empty() {
        return ConsensusSnapshot::baseline(params.confidence_floor);
    }

    // Defensive ordering: callers usually deliver newest-first, but the
    // result must not depend on it.
    surviving.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let minutes_since_latest = surviving[0].1;
    let updated_at = surviving[0].0.created_at;
    let count = surviving.len();

    let mut crowd = AxisTally::<4>::new();
    let mut water = AxisTally::<4>::new();
    let mut beach = AxisTally::<3>::new();

    for (report, age) in &surviving {
        let weight = decay_weight(*age, params.half_life_minutes);
        crowd.add(report.crowd_level.code(), weight);
        if let Some(condition) = report.water_condition {
            water.add(condition.code(), weight);
        }
        if let Some(condition) = report.beach_condition {
            beach.add(condition.code(), weight);
        }
    }

    // Every surviving report votes on the crowd axis, so a winner exists.
    let Some((crowd_winner, agreement)) = crowd.winner() else {
        return ConsensusSnapshot::baseline(params.confidence_floor);
    };
    let crowd_level = CrowdLevel::from_code(crowd_winner).unwrap_or(CrowdLevel::Quiet);
    let water_condition = water
        .winner()
        .and_then(|(code, _)| WaterCondition::from_code(code));
    let beach_condition = beach
        .winner()
        .and_then(|(code, _)| BeachCondition::from_code(code));

    let volume_boost = (count as f64 / params.volume_target).min(1.0);
    let recency_boost =
        (1.0 - minutes_since_latest / params.recency_window_minutes).clamp(0.0, 1.0);
    let confidence = (params.confidence_floor
        + params.agreement_weight * agreement
        + params.volume_weight * volume_boost
        + params.recency_weight * recency_boost)
        .clamp(0.0, 1.0);

    let state = if minutes_since_latest <= params.live_threshold_minutes {
        FreshnessState::Live
    } else {
        FreshnessState::Recent
    };

    ConsensusSnapshot {
        crowd_level,
        water_condition,
        beach_condition,
        state,
        confidence,
        updated_at: Some(updated_at),
        reports_count: count,
    }
}

/// Weighted vote tally for one axis with wire codes `1..=N`.
struct AxisTally<const N: usize> {
    weights: [f64; N],
}

impl<const N: usize> AxisTally<N> {
    fn new() -> Self {
        Self { weights: [0.0; N] }
    }

    fn add(&mut self, code: u8, weight: f64) {
        let index = (code as usize) - 1;
        debug_assert!(index < N, "axis code out of range");
        self.weights[index] += weight;
    }

    /// Winning code and its agreement ratio, or `None` when no report voted
    /// on this axis. Exact ties break toward the numerically higher code:
    /// the more severe reading wins.
    fn winner(&self) -> Option<(u8, f64)> {
        let total: f64 = self.weights.iter().sum();
        if total <= 0.0 {
            return None;
        }

        let mut best_index = 0usize;
        for (index, weight) in self.weights.iter().enumerate() {
            if *weight >= self.weights[best_index] {
                best_index = index;
            }
        }

        Some(((best_index + 1) as u8, self.weights[best_index] / total))
    }
}
