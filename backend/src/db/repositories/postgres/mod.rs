//! Postgres repository implementation using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Bounded in-flight reads with cancellation on caller drop
//! - Automatic retry for transient failures
//! - Automatic migration execution
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

use async_trait::async_trait;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::{Text, Timestamp, Timestamptz};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task;

use crate::db::models::{ReadFilter, SourceRow, SourceStats, SourceStorage, TimestampStorage};
use crate::db::repository::{
    ErrorContext, RepositoryError, RepositoryResult, SeriesRepository, StatusRepository,
};
use crate::models::{SourceKind, Window};
use crate::services::normalize::TimeKeyNormalizer;

mod models;
mod schema;

use models::*;
use schema::SourceTable;

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
    /// Connection timeout in seconds, also bounding the wait for a read slot
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
    /// Timestamp storage convention of each source table
    pub storage: SourceStorage,
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
            storage: SourceStorage::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// Source tables are assumed to use timezone-aware columns; use
    /// `repository.toml` to declare other conventions.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
            storage: defaults.storage,
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
    /// Read slots not currently held
    pub available_read_slots: usize,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
    /// Reads abandoned before they ran
    pub cancelled_reads: u64,
}

/// Sets the shared flag when the awaiting future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Diesel-backed repository for Postgres.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    read_slots: Arc<Semaphore>,
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
    cancelled_reads: Arc<AtomicU64>,
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
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        let read_slots = Arc::new(Semaphore::new(config.max_pool_size.max(1) as usize));

        Ok(Self {
            pool,
            config,
            read_slots,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
            cancelled_reads: Arc::new(AtomicU64::new(0)),
        })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation on the blocking pool.
    ///
    /// Waits for a read slot for at most the connection timeout, then retries
    /// transient failures up to `max_retries` times with exponential backoff. If the
    /// returned future is dropped, the job stops before its next checkout.
    async fn with_conn<T, F>(&self, context: ErrorContext, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let wait = Duration::from_secs(self.config.connection_timeout_sec);
        let permit = tokio::time::timeout(wait, self.read_slots.clone().acquire_owned())
            .await
            .map_err(|_| {
                RepositoryError::timeout_with_context(
                    format!("no read slot within {}s", wait.as_secs()),
                    context.clone(),
                )
            })?
            .map_err(|e| RepositoryError::internal_with_context(e.to_string(), context.clone()))?;

        let cancel = CancelOnDrop::new();
        let cancelled = cancel.flag();

        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();
        let cancelled_reads = self.cancelled_reads.clone();
        let job_context = context.clone();

        let result = task::spawn_blocking(move || {
            let _permit = permit;
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                if cancelled.load(Ordering::Acquire) {
                    cancelled_reads.fetch_add(1, Ordering::Relaxed);
                    return Err(RepositoryError::cancelled(job_context));
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            job_context
                                .clone()
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        log::debug!("retrying {} after: {}", job_context, e);
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
        })?;

        drop(cancel);
        result.map_err(|e| match (&context.operation, e.context().operation.is_none()) {
            (Some(operation), true) => e.with_operation(operation.clone()),
            _ => e,
        })
    }

    /// Get pool health statistics.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            available_read_slots: self.read_slots.available_permits(),
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
            cancelled_reads: self.cancelled_reads.load(Ordering::Relaxed),
        }
    }
}

fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    RepositoryError::from(err)
}

fn load_rows(
    conn: &mut PgConnection,
    table: SourceTable,
    storage: TimestampStorage,
    window: Window,
    model: Option<String>,
) -> RepositoryResult<Vec<SourceRow>> {
    let normalizer = TimeKeyNormalizer::new(storage);

    match normalizer.naive_query_bounds(&window) {
        None => {
            let sql = table.rows_sql("timestamptz", model.is_some());
            let mut query = sql_query(sql)
                .into_boxed::<Pg>()
                .bind::<Timestamptz, _>(window.start().to_datetime())
                .bind::<Timestamptz, _>(window.end().to_datetime());
            if let Some(model) = model.filter(|_| table.model_column.is_some()) {
                query = query.bind::<Text, _>(model);
            }
            query
                .load::<AwareSourceRow>(conn)
                .map(|rows| rows.into_iter().map(SourceRow::from).collect())
                .map_err(map_diesel_error)
        }
        Some((start, end)) => {
            let sql = table.rows_sql("timestamp", model.is_some());
            let mut query = sql_query(sql)
                .into_boxed::<Pg>()
                .bind::<Timestamp, _>(start)
                .bind::<Timestamp, _>(end);
            if let Some(model) = model.filter(|_| table.model_column.is_some()) {
                query = query.bind::<Text, _>(model);
            }
            query
                .load::<NaiveSourceRow>(conn)
                .map(|rows| rows.into_iter().map(SourceRow::from).collect())
                .map_err(map_diesel_error)
        }
    }
}

fn load_stats(
    conn: &mut PgConnection,
    table: SourceTable,
    storage: TimestampStorage,
) -> RepositoryResult<SourceStats> {
    let sql = table.stats_sql();
    if storage.is_naive() {
        sql_query(sql)
            .get_result::<NaiveStatsRow>(conn)
            .map(SourceStats::from)
            .map_err(map_diesel_error)
    } else {
        sql_query(sql)
            .get_result::<AwareStatsRow>(conn)
            .map(SourceStats::from)
            .map_err(map_diesel_error)
    }
}

#[async_trait]
impl SeriesRepository for PostgresRepository {
    fn timestamp_storage(&self, source: SourceKind) -> TimestampStorage {
        self.config.storage.get(source)
    }

    async fn fetch_rows(
        &self,
        source: SourceKind,
        window: &Window,
        filter: &ReadFilter,
    ) -> RepositoryResult<Vec<SourceRow>> {
        let table = SourceTable::for_source(source);
        let storage = self.timestamp_storage(source);
        let window = *window;
        let model = filter.model_for(source).map(str::to_string);

        self.with_conn(
            ErrorContext::new("fetch_rows").with_source(source),
            move |conn| load_rows(conn, table, storage, window, model),
        )
        .await
    }
}

#[async_trait]
impl StatusRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(ErrorContext::new("health_check"), |conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn source_stats(&self, source: SourceKind) -> RepositoryResult<SourceStats> {
        let table = SourceTable::for_source(source);
        let storage = self.timestamp_storage(source);

        self.with_conn(
            ErrorContext::new("source_stats").with_source(source),
            move |conn| load_stats(conn, table, storage),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PostgresConfig::with_url("postgres://localhost/loadwatch");
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.min_pool_size, 1);
        assert_eq!(config.connection_timeout_sec, 30);
        assert_eq!(config.storage, SourceStorage::default());
    }

    #[test]
    fn test_cancel_flag_set_on_drop() {
        let cancel = CancelOnDrop::new();
        let flag = cancel.flag();
        assert!(!flag.load(Ordering::Acquire));
        drop(cancel);
        assert!(flag.load(Ordering::Acquire));
    }
}
