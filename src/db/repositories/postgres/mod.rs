//! Postgres repository implementation using Diesel.
//!
//! This backend hosts the append-only report table and the atomic rate-limit
//! counter primitive on a shared database, which is what makes the gate's
//! abuse controls hold across horizontally scaled server instances.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//! - Cooldown appends serialized per `(location, reporter)` key with a
//!   transaction-scoped advisory lock
//! - Counter increments as a single `INSERT ... ON CONFLICT ... DO UPDATE`
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::task;

use crate::db::repository::{
    CooldownOutcome, CounterRepository, ErrorContext, HealthRepository, ReportRepository,
    RepositoryError, RepositoryResult, RetentionRepository,
};
use crate::models::Report;

mod models;
mod schema;

use models::{RateCounterRow, ReportRow};

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// See the module docs for the variable list.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("PG_POOL_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let connection_timeout_sec = std::env::var("PG_CONN_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_sec = std::env::var("PG_IDLE_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let max_retries = std::env::var("PG_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay_ms = std::env::var("PG_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(100);

        Ok(Self {
            database_url,
            max_pool_size,
            min_pool_size,
            connection_timeout_sec,
            idle_timeout_sec,
            max_retries,
            retry_delay_ms,
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed report store for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    // Metrics counters
    total_queries: std::sync::Arc<AtomicU64>,
    failed_queries: std::sync::Arc<AtomicU64>,
    retried_operations: std::sync::Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: std::sync::Arc::new(AtomicU64::new(0)),
            failed_queries: std::sync::Arc::new(AtomicU64::new(0)),
            retried_operations: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient
    /// failures (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                // Execute the operation
                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics for monitoring.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }
}

fn load_reports(rows: Vec<ReportRow>) -> RepositoryResult<Vec<Report>> {
    rows.into_iter().map(Report::try_from).collect()
}

#[async_trait]
impl ReportRepository for PostgresRepository {
    async fn append_report_if_cool(
        &self,
        report: &Report,
        cooldown: Duration,
    ) -> RepositoryResult<CooldownOutcome> {
        let row = ReportRow::from(report);
        let location = report.location_id.clone();
        let reporter = report.reporter_hash.clone();
        let created_at = report.created_at;
        let cooldown_chrono = chrono::Duration::from_std(cooldown).map_err(|e| {
            RepositoryError::configuration(format!("cooldown out of range: {}", e))
        })?;

        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                // Serialize concurrent submissions for the same pair; the
                // lock is released at transaction end.
                sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                    .bind::<diesel::sql_types::Text, _>(format!("{}\u{1f}{}", location, reporter))
                    .execute(conn)?;

                let last: Option<DateTime<Utc>> = schema::reports::table
                    .filter(schema::reports::location_id.eq(&location))
                    .filter(schema::reports::reporter_hash.eq(&reporter))
                    .select(diesel::dsl::max(schema::reports::created_at))
                    .first(conn)?;

                if let Some(last) = last {
                    let elapsed = created_at.signed_duration_since(last);
                    if elapsed < cooldown_chrono {
                        let retry_after = (cooldown_chrono - elapsed)
                            .to_std()
                            .unwrap_or(Duration::ZERO);
                        return Ok(CooldownOutcome::TooSoon { retry_after });
                    }
                }

                diesel::insert_into(schema::reports::table)
                    .values(&row)
                    .execute(conn)?;

                Ok(CooldownOutcome::Accepted)
            })
        })
        .await
        .map_err(|e| e.with_operation("append_report_if_cool"))
    }

    async fn fetch_reports_for_location(
        &self,
        location_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> RepositoryResult<Vec<Report>> {
        let location = location_id.to_string();
        let rows = self
            .with_conn(move |conn| {
                schema::reports::table
                    .filter(schema::reports::location_id.eq(&location))
                    .filter(schema::reports::created_at.ge(since))
                    .order(schema::reports::created_at.desc())
                    .limit(limit as i64)
                    .load::<ReportRow>(conn)
                    .map_err(RepositoryError::from)
            })
            .await
            .map_err(|e| e.with_operation("fetch_reports_for_location"))?;

        load_reports(rows)
    }

    async fn fetch_recent_reports(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> RepositoryResult<Vec<Report>> {
        let rows = self
            .with_conn(move |conn| {
                schema::reports::table
                    .filter(schema::reports::created_at.ge(since))
                    .order(schema::reports::created_at.desc())
                    .limit(limit as i64)
                    .load::<ReportRow>(conn)
                    .map_err(RepositoryError::from)
            })
            .await
            .map_err(|e| e.with_operation("fetch_recent_reports"))?;

        load_reports(rows)
    }
}

#[async_trait]
impl CounterRepository for PostgresRepository {
    async fn increment_window_counter(
        &self,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let row = RateCounterRow {
            counter_key: key.to_string(),
            count: 1,
            expires_at,
        };

        let count = self
            .with_conn(move |conn| {
                // Opportunistic purge of closed windows
                diesel::delete(
                    schema::rate_counters::table
                        .filter(schema::rate_counters::expires_at.lt(Utc::now())),
                )
                .execute(conn)?;

                // Single atomic check-and-increment: concurrent callers each
                // observe a distinct count
                diesel::insert_into(schema::rate_counters::table)
                    .values(&row)
                    .on_conflict(schema::rate_counters::counter_key)
                    .do_update()
                    .set(
                        schema::rate_counters::count
                            .eq(schema::rate_counters::count + 1),
                    )
                    .returning(schema::rate_counters::count)
                    .get_result::<i64>(conn)
                    .map_err(RepositoryError::from)
            })
            .await
            .map_err(|e| e.with_operation("increment_window_counter"))?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl RetentionRepository for PostgresRepository {
    async fn count_reports_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let count = self
            .with_conn(move |conn| {
                schema::reports::table
                    .filter(schema::reports::created_at.lt(cutoff))
                    .count()
                    .get_result::<i64>(conn)
                    .map_err(RepositoryError::from)
            })
            .await
            .map_err(|e| e.with_operation("count_reports_older_than"))?;

        Ok(count.max(0) as u64)
    }

    async fn delete_reports_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let deleted = self
            .with_conn(move |conn| {
                diesel::delete(
                    schema::reports::table.filter(schema::reports::created_at.lt(cutoff)),
                )
                .execute(conn)
                .map_err(RepositoryError::from)
            })
            .await
            .map_err(|e| e.with_operation("delete_reports_older_than"))?;

        Ok(deleted as u64)
    }
}

#[async_trait]
impl HealthRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(RepositoryError::from)
        })
        .await
        .map_err(|e| e.with_operation("health_check"))
    }
}
