//! PostgreSQL integration - pooled connection handle and statement executor
//!
//! The pool is created lazily on first use and closed explicitly at shutdown.
//! Commands that never touch the database (e.g. `generate`) never connect.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{Executor, PgPool, Postgres, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::error::{MigrateError, MigrateResult};
use crate::executor::{Batch, Query, StatementExecutor};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a free connection
    pub acquire_timeout: u64,
    /// Milliseconds a connection may sit idle before being closed
    pub idle_timeout_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: 30,
            idle_timeout_ms: Some(30_000),
        }
    }
}

/// Process-wide database handle
pub struct Database {
    database_url: String,
    config: PoolConfig,
    pool: OnceCell<PgPool>,
}

impl Database {
    pub fn new(database_url: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            database_url: database_url.into(),
            config,
            pool: OnceCell::new(),
        }
    }

    /// Get the pool, connecting on first use
    pub async fn pool(&self) -> MigrateResult<&PgPool> {
        self.pool
            .get_or_try_init(|| async {
                tracing::debug!(
                    max_connections = self.config.max_connections,
                    acquire_timeout = self.config.acquire_timeout,
                    "Connecting database pool"
                );
                PgPoolOptions::new()
                    .max_connections(self.config.max_connections)
                    .min_connections(self.config.min_connections)
                    .acquire_timeout(Duration::from_secs(self.config.acquire_timeout))
                    .idle_timeout(self.config.idle_timeout_ms.map(Duration::from_millis))
                    .connect(&self.database_url)
                    .await
                    .map_err(|e| MigrateError::Connection(e.to_string()))
            })
            .await
    }

    /// Whether the pool has been created
    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Close the pool if it was ever opened
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            tracing::debug!("Database pool closed");
        }
    }
}

/// Classify sqlx errors into connection and execution failures
pub(crate) fn classify_error(error: sqlx::Error, context: &str) -> MigrateError {
    match &error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => MigrateError::Connection(error.to_string()),
        _ => MigrateError::Execution(format!("{}: {}", context, error)),
    }
}

fn bind_params<'q>(query: &'q Query) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    let mut prepared = sqlx::query(query.text());
    for param in query.params() {
        prepared = prepared.bind(param.as_str());
    }
    prepared
}

/// Statement executor over a PostgreSQL pool
pub struct PgExecutor {
    database: Arc<Database>,
}

impl PgExecutor {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl StatementExecutor for PgExecutor {
    async fn fetch_column(&self, query: &Query) -> MigrateResult<Vec<String>> {
        let pool = self.database.pool().await?;
        let rows = bind_params(query).fetch_all(pool).await.map_err(|e| match e {
            sqlx::Error::Database(db) => MigrateError::Query(db.to_string()),
            other => classify_error(other, "read failed"),
        })?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(0)
                    .map_err(|e| MigrateError::Query(format!("Failed to decode column: {}", e)))
            })
            .collect()
    }

    async fn execute_batch(&self, batch: &Batch) -> MigrateResult<()> {
        let pool = self.database.pool().await?;
        let mut transaction = pool
            .begin()
            .await
            .map_err(|e| classify_error(e, "Failed to start transaction"))?;

        for (index, query) in batch.iter().enumerate() {
            tracing::debug!(statement = index, sql = query.text(), "Executing");
            let result = if query.has_params() {
                bind_params(query).execute(&mut *transaction).await
            } else {
                (&mut *transaction).execute(query.text()).await
            };

            if let Err(e) = result {
                if let Err(rollback_err) = transaction.rollback().await {
                    tracing::warn!("Rollback after failure also failed: {}", rollback_err);
                }
                return Err(classify_error(e, &format!("statement {} failed", index + 1)));
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| classify_error(e, "Failed to commit transaction"))?;
        tracing::debug!(statements = batch.len(), "Batch committed");
        Ok(())
    }
}
