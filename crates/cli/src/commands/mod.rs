pub mod database;
pub mod migrate;

use anyhow::Context;
use rivet_core::{DatabaseConfig, RivetConfig};
use rivet_migrate::{Database, MigrationConfig, MigrationRunner, PgExecutor, PoolConfig};
use std::sync::Arc;

/// Shared state of one `rivet` invocation
pub struct AppContext {
    config: RivetConfig,
    database: Arc<Database>,
}

impl AppContext {
    /// The database handle is created here but only connects on first use
    pub fn new(config: RivetConfig) -> Self {
        let database = Arc::new(Database::new(
            config.database.url.clone(),
            pool_config(&config.database),
        ));
        Self { config, database }
    }

    pub fn config(&self) -> &RivetConfig {
        &self.config
    }

    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig {
            migrations_dir: self.config.migrations_dir.clone(),
            migrations_table: self.config.migrations_table.clone(),
        }
    }

    /// Runner over the shared PostgreSQL pool
    pub fn runner(&self) -> anyhow::Result<MigrationRunner> {
        tracing::debug!(
            database = %self.config.database.masked_url(),
            migrations_dir = %self.config.migrations_dir.display(),
            "Using database"
        );
        let executor = Arc::new(PgExecutor::new(self.database.clone()));
        MigrationRunner::new(&self.migration_config(), executor)
            .context("Invalid migration configuration")
    }

    /// Close the pool if any command opened it
    pub async fn shutdown(&self) {
        self.database.close().await;
    }
}

fn pool_config(database: &DatabaseConfig) -> PoolConfig {
    PoolConfig {
        max_connections: database.max_connections,
        acquire_timeout: database.acquire_timeout_secs,
        idle_timeout_ms: Some(database.idle_timeout_ms),
        ..PoolConfig::default()
    }
}
