//! Version Store - persisted record of applied migration ids
//!
//! One row per applied id in a single-column table. Writes are returned as
//! queries so callers can put them in the same batch as the migration SQL.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::definitions::MigrationId;
use crate::error::{MigrateError, MigrateResult};
use crate::executor::{Query, StatementExecutor};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

/// Applied-version tracking table
#[derive(Debug, Clone)]
pub struct VersionStore {
    table: String,
}

impl VersionStore {
    /// Create a store over `table`, which must be a plain SQL identifier
    pub fn new(table: impl Into<String>) -> MigrateResult<Self> {
        let table = table.into();
        if !IDENTIFIER.is_match(&table) {
            return Err(MigrateError::InvalidTableName(table));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Drop and recreate the tracking table
    pub fn setup_queries(&self) -> Vec<Query> {
        vec![
            Query::raw(format!("DROP TABLE IF EXISTS \"{}\"", self.table)),
            Query::raw(format!(
                "CREATE TABLE \"{}\" (\"version\" varchar NOT NULL PRIMARY KEY)",
                self.table
            )),
        ]
    }

    /// Whether the tracking table has been provisioned
    pub async fn exists(&self, executor: &dyn StatementExecutor) -> MigrateResult<bool> {
        let query = Query::bound(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1",
            [self.table.as_str()],
        );
        Ok(!executor.fetch_column(&query).await?.is_empty())
    }

    /// Greatest applied id, `None` when nothing has been applied
    pub async fn latest(
        &self,
        executor: &dyn StatementExecutor,
    ) -> MigrateResult<Option<MigrationId>> {
        let query = Query::raw(format!(
            "SELECT version FROM \"{}\" ORDER BY version DESC LIMIT 1",
            self.table
        ));
        executor
            .fetch_column(&query)
            .await?
            .into_iter()
            .next()
            .map(|version| version.parse())
            .transpose()
    }

    /// Every applied id, ascending
    pub async fn applied(&self, executor: &dyn StatementExecutor) -> MigrateResult<Vec<MigrationId>> {
        let query = Query::raw(format!(
            "SELECT version FROM \"{}\" ORDER BY version ASC",
            self.table
        ));
        executor
            .fetch_column(&query)
            .await?
            .into_iter()
            .map(|version| version.parse())
            .collect()
    }

    /// Insert one row per id
    pub fn record_applied<'a, I>(&self, ids: I) -> Vec<Query>
    where
        I: IntoIterator<Item = &'a MigrationId>,
    {
        let sql = format!("INSERT INTO \"{}\" (version) VALUES ($1)", self.table);
        ids.into_iter()
            .map(|id| Query::bound(sql.clone(), [id.as_str()]))
            .collect()
    }

    /// Delete the row of each id
    pub fn record_reverted<'a, I>(&self, ids: I) -> Vec<Query>
    where
        I: IntoIterator<Item = &'a MigrationId>,
    {
        let sql = format!("DELETE FROM \"{}\" WHERE version = $1", self.table);
        ids.into_iter()
            .map(|id| Query::bound(sql.clone(), [id.as_str()]))
            .collect()
    }
}
