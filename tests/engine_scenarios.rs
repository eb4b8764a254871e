//! Scenario tests for the consensus engine over the public API, pairing the
//! gate, the in-memory store, and the engine the way a deployment does.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use shorecast::config::{AppConfig, FeedConfig};
use shorecast::db::repository::{CooldownOutcome, ReportRepository};
use shorecast::db::LocalRepository;
use shorecast::models::{CrowdLevel, FreshnessState, Report};
use shorecast::services::consensus::{compute_snapshot, ConsensusParams};
use shorecast::services::ingestion::{ClientContext, IngestionGate};
use shorecast::services::rate_limit::InMemoryRateLimiter;
use shorecast::services::validation::ReportSubmission;
use shorecast::services::feed;

fn report(location: &str, level: u8, age_minutes: i64, now: DateTime<Utc>) -> Report {
    Report {
        id: Uuid::new_v4(),
        location_id: location.to_string(),
        crowd_level: CrowdLevel::from_code(level).unwrap(),
        water_condition: None,
        beach_condition: None,
        reporter_hash: format!("reporter-{}", age_minutes),
        created_at: now - chrono::Duration::minutes(age_minutes),
        attribution: None,
        client_origin: None,
        client_agent: None,
    }
}

async fn seed(repo: &LocalRepository, report: &Report) {
    assert_eq!(
        repo.append_report_if_cool(report, Duration::ZERO).await.unwrap(),
        CooldownOutcome::Accepted
    );
}

#[tokio::test]
async fn scenario_recent_majority_beats_old_dissent() {
    // [{level:3, age:2m}, {level:3, age:4m}, {level:1, age:20m}] with a 30m
    // TTL: the fresh level-3 votes dominate, and the 2-minute latest report
    // makes the snapshot LIVE.
    let now = Utc::now();
    let repo = LocalRepository::new();
    for r in [
        report("bondi", 3, 2, now),
        report("bondi", 3, 4, now),
        report("bondi", 1, 20, now),
    ] {
        seed(&repo, &r).await;
    }

    let reports = feed::recent_reports_for_location(&repo, "bondi", &FeedConfig::default(), now)
        .await
        .unwrap();
    let snapshot = compute_snapshot(&reports, now, &ConsensusParams::default());

    assert_eq!(snapshot.crowd_level, CrowdLevel::Crowded);
    assert_eq!(snapshot.state, FreshnessState::Live);
    assert_eq!(snapshot.reports_count, 3);
}

#[tokio::test]
async fn scenario_single_aging_report() {
    // A single {level:4, age:10m} report: RECENT, full agreement.
    let now = Utc::now();
    let repo = LocalRepository::new();
    seed(&repo, &report("bondi", 4, 10, now)).await;

    let reports = feed::recent_reports_for_location(&repo, "bondi", &FeedConfig::default(), now)
        .await
        .unwrap();
    let snapshot = compute_snapshot(&reports, now, &ConsensusParams::default());

    assert_eq!(snapshot.crowd_level, CrowdLevel::Packed);
    assert_eq!(snapshot.state, FreshnessState::Recent);
    assert_eq!(snapshot.reports_count, 1);
    // agreement 1.0 dominates the confidence blend
    let expected = 0.15 + 0.55 * 1.0 + 0.20 * 0.1 + 0.10 * (1.0 - 10.0 / 45.0);
    assert!((snapshot.confidence - expected).abs() < 1e-9);
}

#[tokio::test]
async fn scenario_rapid_duplicate_from_same_reporter() {
    // Two submissions from one reporter within a minute: the second is
    // rejected with a positive retry hint.
    let repo: Arc<LocalRepository> = Arc::new(LocalRepository::new());
    let gate = IngestionGate::new(
        repo,
        Arc::new(InMemoryRateLimiter::new()),
        AppConfig::default().gate,
    );

    let submission = || ReportSubmission {
        location_id: Some("bondi".to_string()),
        crowd_level: Some(json!(2)),
        water_condition: None,
        beach_condition: None,
        reporter_hash: Some("same-device".to_string()),
        attribution: None,
    };

    gate.submit(submission(), &ClientContext::default())
        .await
        .expect("first submission accepted");

    let err = gate
        .submit(submission(), &ClientContext::default())
        .await
        .expect_err("second submission rejected");
    assert_eq!(err.code(), "too_soon");
    assert!(err.retry_after_seconds().unwrap() > 0);
}

#[tokio::test]
async fn feed_window_excludes_old_reports_and_caps_rows() {
    let now = Utc::now();
    let repo = LocalRepository::new();

    // One report outside the 6h lookback, three inside
    seed(&repo, &report("bondi", 2, 7 * 60, now)).await;
    for age in [10, 20, 30] {
        seed(&repo, &report("bondi", 2, age, now)).await;
    }

    let config = FeedConfig::default();
    let reports = feed::recent_reports_for_location(&repo, "bondi", &config, now)
        .await
        .unwrap();
    assert_eq!(reports.len(), 3);

    let capped = FeedConfig {
        max_rows: 2,
        ..config
    };
    let reports = feed::recent_reports_for_location(&repo, "bondi", &capped, now)
        .await
        .unwrap();
    assert_eq!(reports.len(), 2);
    // The cap keeps the newest rows
    assert!(reports[0].created_at >= reports[1].created_at);
}

#[tokio::test]
async fn engine_output_is_stable_across_feed_rereads() {
    // Reading the feed twice and recomputing yields identical snapshots:
    // the engine has no hidden state.
    let now = Utc::now();
    let repo = LocalRepository::new();
    for age in [1, 5, 9] {
        seed(&repo, &report("bondi", 3, age, now)).await;
    }

    let config = FeedConfig::default();
    let params = ConsensusParams::default();

    let first_read = feed::recent_reports_for_location(&repo, "bondi", &config, now)
        .await
        .unwrap();
    let second_read = feed::recent_reports_for_location(&repo, "bondi", &config, now)
        .await
        .unwrap();

    assert_eq!(
        compute_snapshot(&first_read, now, &params),
        compute_snapshot(&second_read, now, &params)
    );
}
