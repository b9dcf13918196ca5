//! # rivet-migrate: Versioned schema migrations for PostgreSQL
//!
//! Migrations are `.sql` files named `<YYYYMMDDHHMMSS>_<name>.sql` holding an
//! `up` and a `down` section. The runner applies every pending migration in one
//! transaction together with its version rows; rollback does the reverse.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rivet_migrate::{Database, MigrationConfig, MigrationRollback, MigrationRunner, PgExecutor, PoolConfig};
//!
//! # async fn example() -> rivet_migrate::MigrateResult<()> {
//! let database = Arc::new(Database::new("postgres://localhost/app", PoolConfig::default()));
//! let runner = MigrationRunner::new(
//!     &MigrationConfig::default(),
//!     Arc::new(PgExecutor::new(database.clone())),
//! )?;
//!
//! runner.run(None).await?;
//! runner.rollback(None).await?;
//! database.close().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod database;
pub mod definitions;
pub mod error;
pub mod executor;
pub mod generator;
pub mod loader;
pub mod rollback;
pub mod runner;
pub mod version_store;

#[cfg(test)]
mod testing;

pub use catalog::*;
pub use database::*;
pub use definitions::*;
pub use error::*;
pub use executor::*;
pub use generator::*;
pub use loader::*;
pub use rollback::*;
pub use runner::*;
pub use version_store::*;
