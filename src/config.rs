//! Runtime configuration for the gate, the consensus engine, feeds, and
//! retention.
//!
//! Configuration is loaded from environment variables with defaults, or from
//! a TOML file when one is supplied. The numeric tuning constants (decay
//! half-life, TTL, thresholds, confidence weights) are product choices and
//! deliberately configurable rather than hard-coded.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::services::consensus::ConsensusParams;

/// Ingestion gate tuning.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum wait between two reports from the same reporter for the same
    /// location.
    pub cooldown: Duration,
    /// Fixed window for the anonymous volume limiter.
    pub volume_window: Duration,
    /// Maximum accepted requests per volume window and key.
    pub volume_max_per_window: u64,
    /// Deadline for report store operations issued by the gate.
    pub store_timeout: Duration,
    /// Request payload cap in bytes.
    pub max_body_bytes: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10 * 60),
            volume_window: Duration::from_secs(60),
            volume_max_per_window: 20,
            store_timeout: Duration::from_millis(2000),
            max_body_bytes: 8 * 1024,
        }
    }
}

/// Feed read tuning.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Bounded lookback window served to clients.
    pub lookback: Duration,
    /// Maximum rows returned per feed read.
    pub max_rows: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(6 * 3600),
            max_rows: 5000,
        }
    }
}

/// Retention pruning tuning.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Reports older than this are eligible for deletion.
    pub retention: Duration,
    /// Bearer token authorizing the prune endpoint. Pruning is refused when
    /// unset.
    pub admin_token: Option<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(30 * 24 * 3600),
            admin_token: None,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub gate: GateConfig,
    pub consensus: ConsensusParams,
    pub feed: FeedConfig,
    pub retention: RetentionConfig,
}

impl AppConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// # Environment Variables
    /// - `RATE_LIMIT_MINUTES` (default: 10): per-reporter cooldown
    /// - `VOLUME_WINDOW_SECONDS` (default: 60): anonymous limiter window
    /// - `VOLUME_MAX_PER_WINDOW` (default: 20): requests allowed per window
    /// - `STORE_TIMEOUT_MS` (default: 2000): store operation deadline
    /// - `MAX_BODY_BYTES` (default: 8192): request payload cap
    /// - `TTL_MINUTES` (default: 30): report time-to-live
    /// - `HALF_LIFE_MINUTES` (default: 18): decay half-life parameter
    /// - `LIVE_THRESHOLD_MINUTES` (default: 5): LIVE/RECENT boundary
    /// - `FEED_LOOKBACK_HOURS` (default: 6): feed window
    /// - `FEED_MAX_ROWS` (default: 5000): feed row cap
    /// - `RETENTION_DAYS` (default: 30): pruning cutoff
    /// - `ADMIN_TOKEN` (optional): authorizes the prune endpoint
    pub fn from_env() -> Self {
        let defaults = ConsensusParams::default();
        let consensus = ConsensusParams {
            ttl_minutes: env_parse("TTL_MINUTES", defaults.ttl_minutes),
            half_life_minutes: env_parse("HALF_LIFE_MINUTES", defaults.half_life_minutes),
            live_threshold_minutes: env_parse(
                "LIVE_THRESHOLD_MINUTES",
                defaults.live_threshold_minutes,
            ),
            ..defaults
        };

        Self {
            gate: GateConfig {
                cooldown: Duration::from_secs(env_parse("RATE_LIMIT_MINUTES", 10u64) * 60),
                volume_window: Duration::from_secs(env_parse("VOLUME_WINDOW_SECONDS", 60u64)),
                volume_max_per_window: env_parse("VOLUME_MAX_PER_WINDOW", 20u64),
                store_timeout: Duration::from_millis(env_parse("STORE_TIMEOUT_MS", 2000u64)),
                max_body_bytes: env_parse("MAX_BODY_BYTES", 8 * 1024usize),
            },
            consensus,
            feed: FeedConfig {
                lookback: Duration::from_secs(env_parse("FEED_LOOKBACK_HOURS", 6u64) * 3600),
                max_rows: env_parse("FEED_MAX_ROWS", 5000usize),
            },
            retention: RetentionConfig {
                retention: Duration::from_secs(env_parse("RETENTION_DAYS", 30u64) * 24 * 3600),
                admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            },
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// Missing sections and fields fall back to the same defaults as
    /// [`AppConfig::from_env`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(file.into())
    }

    /// Load configuration from `SHORECAST_CONFIG` when set, otherwise from
    /// the environment.
    pub fn load() -> Result<Self, String> {
        match env::var("SHORECAST_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Ok(Self::from_env()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// ==================== TOML file representation ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    gate: GateSection,
    #[serde(default)]
    consensus: ConsensusSection,
    #[serde(default)]
    feed: FeedSection,
    #[serde(default)]
    retention: RetentionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GateSection {
    #[serde(default = "default_rate_limit_minutes")]
    rate_limit_minutes: u64,
    #[serde(default = "default_volume_window_seconds")]
    volume_window_seconds: u64,
    #[serde(default = "default_volume_max_per_window")]
    volume_max_per_window: u64,
    #[serde(default = "default_store_timeout_ms")]
    store_timeout_ms: u64,
    #[serde(default = "default_max_body_bytes")]
    max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConsensusSection {
    #[serde(default = "default_ttl_minutes")]
    ttl_minutes: f64,
    #[serde(default = "default_half_life_minutes")]
    half_life_minutes: f64,
    #[serde(default = "default_live_threshold_minutes")]
    live_threshold_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeedSection {
    #[serde(default = "default_feed_lookback_hours")]
    lookback_hours: u64,
    #[serde(default = "default_feed_max_rows")]
    max_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RetentionSection {
    #[serde(default = "default_retention_days")]
    retention_days: u64,
    #[serde(default)]
    admin_token: Option<String>,
}

fn default_rate_limit_minutes() -> u64 {
    10
}

fn default_volume_window_seconds() -> u64 {
    60
}

fn default_volume_max_per_window() -> u64 {
    20
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_max_body_bytes() -> usize {
    8 * 1024
}

fn default_ttl_minutes() -> f64 {
    30.0
}

fn default_half_life_minutes() -> f64 {
    18.0
}

fn default_live_threshold_minutes() -> f64 {
    5.0
}

fn default_feed_lookback_hours() -> u64 {
    6
}

fn default_feed_max_rows() -> usize {
    5000
}

fn default_retention_days() -> u64 {
    30
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            rate_limit_minutes: default_rate_limit_minutes(),
            volume_window_seconds: default_volume_window_seconds(),
            volume_max_per_window: default_volume_max_per_window(),
            store_timeout_ms: default_store_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            half_life_minutes: default_half_life_minutes(),
            live_threshold_minutes: default_live_threshold_minutes(),
        }
    }
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            lookback_hours: default_feed_lookback_hours(),
            max_rows: default_feed_max_rows(),
        }
    }
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            admin_token: None,
        }
    }
}

impl From<ConfigFile> for AppConfig {
    fn from(file: ConfigFile) -> Self {
        let consensus = ConsensusParams {
            ttl_minutes: file.consensus.ttl_minutes,
            half_life_minutes: file.consensus.half_life_minutes,
            live_threshold_minutes: file.consensus.live_threshold_minutes,
            ..ConsensusParams::default()
        };

        Self {
            gate: GateConfig {
                cooldown: Duration::from_secs(file.gate.rate_limit_minutes * 60),
                volume_window: Duration::from_secs(file.gate.volume_window_seconds),
                volume_max_per_window: file.gate.volume_max_per_window,
                store_timeout: Duration::from_millis(file.gate.store_timeout_ms),
                max_body_bytes: file.gate.max_body_bytes,
            },
            consensus,
            feed: FeedConfig {
                lookback: Duration::from_secs(file.feed.lookback_hours * 3600),
                max_rows: file.feed.max_rows,
            },
            retention: RetentionConfig {
                retention: Duration::from_secs(file.retention.retention_days * 24 * 3600),
                admin_token: file.retention.admin_token.filter(|t| !t.is_empty()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_product_tuning() {
        let config = AppConfig::default();
        assert_eq!(config.gate.cooldown, Duration::from_secs(600));
        assert_eq!(config.gate.volume_window, Duration::from_secs(60));
        assert_eq!(config.gate.max_body_bytes, 8192);
        assert_eq!(config.consensus.ttl_minutes, 30.0);
        assert_eq!(config.consensus.half_life_minutes, 18.0);
        assert_eq!(config.feed.lookback, Duration::from_secs(6 * 3600));
        assert_eq!(config.feed.max_rows, 5000);
        assert_eq!(config.retention.retention, Duration::from_secs(30 * 24 * 3600));
        assert!(config.retention.admin_token.is_none());
    }

    #[test]
    fn test_from_toml_partial_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [gate]
            rate_limit_minutes = 5

            [consensus]
            ttl_minutes = 45.0
            "#,
        )
        .unwrap();
        let config: AppConfig = file.into();

        assert_eq!(config.gate.cooldown, Duration::from_secs(300));
        // Unset fields keep their defaults
        assert_eq!(config.gate.volume_max_per_window, 20);
        assert_eq!(config.consensus.ttl_minutes, 45.0);
        assert_eq!(config.consensus.half_life_minutes, 18.0);
    }

    #[test]
    fn test_from_toml_empty_file() {
        let file: ConfigFile = toml::from_str("").unwrap();
        let config: AppConfig = file.into();
        assert_eq!(config.gate.cooldown, Duration::from_secs(600));
        assert_eq!(config.feed.max_rows, 5000);
    }
}
