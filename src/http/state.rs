//! Application state for the HTTP server.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::repository::FullRepository;
use crate::services::ingestion::IngestionGate;
use crate::services::rate_limit::RateLimiter;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Report store instance
    pub repository: Arc<dyn FullRepository>,
    /// Ingestion gate wired with the repository and a rate limiter
    pub gate: Arc<IngestionGate>,
    /// Runtime configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create application state from a repository, limiter, and config.
    pub fn new(
        repository: Arc<dyn FullRepository>,
        limiter: Arc<dyn RateLimiter>,
        config: AppConfig,
    ) -> Self {
        let gate = Arc::new(IngestionGate::new(
            repository.clone(),
            limiter,
            config.gate.clone(),
        ));
        Self {
            repository,
            gate,
            config: Arc::new(config),
        }
    }
}
