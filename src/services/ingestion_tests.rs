#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use crate::config::GateConfig;
    use crate::db::repository::{
        CooldownOutcome, CounterRepository, FullRepository, HealthRepository, ReportRepository,
        RepositoryError, RepositoryResult, RetentionRepository,
    };
    use crate::db::LocalRepository;
    use crate::models::{CrowdLevel, Report};
    use crate::services::ingestion::{ClientContext, GateError, IngestionGate};
    use crate::services::rate_limit::{InMemoryRateLimiter, RateDecision, RateLimiter};
    use crate::services::validation::ReportSubmission;

    fn submission(location: &str, reporter: &str) -> ReportSubmission {
        ReportSubmission {
            location_id: Some(location.to_string()),
            crowd_level: Some(json!(3)),
            water_condition: None,
            beach_condition: None,
            reporter_hash: Some(reporter.to_string()),
            attribution: None,
        }
    }

    fn test_config() -> GateConfig {
        GateConfig {
            cooldown: Duration::from_secs(600),
            volume_window: Duration::from_secs(60),
            volume_max_per_window: 100,
            store_timeout: Duration::from_secs(2),
            max_body_bytes: 8192,
        }
    }

    fn gate_with(repo: Arc<dyn FullRepository>, config: GateConfig) -> IngestionGate {
        IngestionGate::new(repo, Arc::new(InMemoryRateLimiter::new()), config)
    }

    // ==================== Test doubles ====================

    /// Repository whose every operation fails with a retryable error.
    struct DownRepository;

    #[async_trait]
    impl ReportRepository for DownRepository {
        async fn append_report_if_cool(
            &self,
            _report: &Report,
            _cooldown: Duration,
        ) -> RepositoryResult<CooldownOutcome> {
            Err(RepositoryError::connection("store down"))
        }

        async fn fetch_reports_for_location(
            &self,
            _location_id: &str,
            _since: DateTime<Utc>,
            _limit: usize,
        ) -> RepositoryResult<Vec<Report>> {
            Err(RepositoryError::connection("store down"))
        }

        async fn fetch_recent_reports(
            &self,
            _since: DateTime<Utc>,
            _limit: usize,
        ) -> RepositoryResult<Vec<Report>> {
            Err(RepositoryError::connection("store down"))
        }
    }

    #[async_trait]
    impl CounterRepository for DownRepository {
        async fn increment_window_counter(
            &self,
            _key: &str,
            _expires_at: DateTime<Utc>,
        ) -> RepositoryResult<u64> {
            Err(RepositoryError::connection("store down"))
        }
    }

    #[async_trait]
    impl RetentionRepository for DownRepository {
        async fn count_reports_older_than(&self, _cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
            Err(RepositoryError::connection("store down"))
        }

        async fn delete_reports_older_than(&self, _cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
            Err(RepositoryError::connection("store down"))
        }
    }

    #[async_trait]
    impl HealthRepository for DownRepository {
        async fn health_check(&self) -> RepositoryResult<bool> {
            Ok(false)
        }
    }

    /// Limiter that always errors, for the fail-open path.
    struct BrokenLimiter;

    #[async_trait]
    impl RateLimiter for BrokenLimiter {
        async fn check_and_consume(
            &self,
            _key: &str,
            _limit: u64,
            _window: Duration,
            _now: DateTime<Utc>,
        ) -> RepositoryResult<RateDecision> {
            Err(RepositoryError::connection("limiter down"))
        }
    }

    /// Limiter that counts calls and always allows.
    #[derive(Default)]
    struct CountingLimiter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateLimiter for CountingLimiter {
        async fn check_and_consume(
            &self,
            _key: &str,
            _limit: u64,
            _window: Duration,
            _now: DateTime<Utc>,
        ) -> RepositoryResult<RateDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RateDecision::Allowed)
        }
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_submit_persists_and_stamps() {
        let repo = Arc::new(LocalRepository::new());
        let gate = gate_with(repo.clone(), test_config());
        let before = Utc::now();

        let report = gate
            .submit(
                submission("bondi", "dev-1"),
                &ClientContext {
                    origin: Some("203.0.113.9".to_string()),
                    agent: Some("mobile-app/2.1".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(report.location_id, "bondi");
        assert_eq!(report.crowd_level, CrowdLevel::Crowded);
        assert!(report.created_at >= before);
        assert_eq!(report.client_origin.as_deref(), Some("203.0.113.9"));
        assert_eq!(repo.report_count(), 1);
    }

    #[tokio::test]
    async fn test_rapid_duplicate_rejected_too_soon() {
        let repo = Arc::new(LocalRepository::new());
        let gate = gate_with(repo, test_config());
        let context = ClientContext::default();

        gate.submit(submission("bondi", "dev-1"), &context)
            .await
            .unwrap();

        match gate.submit(submission("bondi", "dev-1"), &context).await {
            Err(GateError::TooSoon { .. }) => {}
            other => panic!("expected TooSoon, got {:?}", other.map(|r| r.id)),
        }

        let err = gate
            .submit(submission("bondi", "dev-1"), &context)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "too_soon");
        assert!(err.retry_after_seconds().unwrap() > 0);

        // A different reporter at the same location is unaffected
        assert!(gate
            .submit(submission("bondi", "dev-2"), &context)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_accepted_after_cooldown_elapses() {
        let repo = Arc::new(LocalRepository::new());
        let mut config = test_config();
        config.cooldown = Duration::from_millis(50);
        let gate = gate_with(repo, config);
        let context = ClientContext::default();

        gate.submit(submission("bondi", "dev-1"), &context)
            .await
            .unwrap();
        assert!(matches!(
            gate.submit(submission("bondi", "dev-1"), &context).await,
            Err(GateError::TooSoon { .. })
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(gate
            .submit(submission("bondi", "dev-1"), &context)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_volume_limiter_rejects_over_budget() {
        let repo = Arc::new(LocalRepository::new());
        let mut config = test_config();
        config.volume_max_per_window = 2;
        // Distinct reporters so the cooldown layer stays out of the way
        let gate = gate_with(repo, config.clone());
        let context = ClientContext {
            origin: Some("203.0.113.9".to_string()),
            agent: Some("curl/8.0".to_string()),
        };

        for i in 0..2 {
            gate.submit(submission("bondi", &format!("dev-{}", i)), &context)
                .await
                .unwrap();
        }

        let err = gate
            .submit(submission("bondi", "dev-9"), &context)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "rate_limited");
        let retry = err.retry_after_seconds().unwrap();
        assert!(retry >= 1 && retry <= config.volume_window.as_secs());
    }

    #[tokio::test]
    async fn test_volume_limiter_failure_fails_open() {
        let repo = Arc::new(LocalRepository::new());
        let gate = IngestionGate::new(repo, Arc::new(BrokenLimiter), test_config());

        // The broken limiter alone must not block the submission
        assert!(gate
            .submit(submission("bondi", "dev-1"), &ClientContext::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let gate = gate_with(Arc::new(DownRepository), test_config());

        let err = gate
            .submit(submission("bondi", "dev-1"), &ClientContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Unavailable(_)));
        assert_eq!(err.code(), "store_unavailable");
        assert!(err.retry_after_seconds().is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_never_touches_store_or_limiter() {
        let limiter = Arc::new(CountingLimiter::default());
        let gate = IngestionGate::new(Arc::new(DownRepository), limiter.clone(), test_config());

        let mut bad = submission("bondi", "dev-1");
        bad.crowd_level = Some(json!(99));

        let err = gate
            .submit(bad, &ClientContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_crowd_level");
        // Rejected before any I/O: the limiter was never consulted
        assert_eq!(limiter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_attribution_is_filtered_before_persistence() {
        let repo = Arc::new(LocalRepository::new());
        let gate = gate_with(repo, test_config());

        let mut s = submission("bondi", "dev-1");
        s.attribution = Some(
            json!({"source": "qr", "session_token": "secret"})
                .as_object()
                .unwrap()
                .clone(),
        );

        let report = gate.submit(s, &ClientContext::default()).await.unwrap();
        let attribution = report.attribution.unwrap();
        assert_eq!(attribution.len(), 1);
        assert!(attribution.contains_key("source"));
    }
}
