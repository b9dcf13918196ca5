//! Migration Runner - applies pending migrations forward
//!
//! Everything selected by one run goes into a single batch together with the
//! version-store inserts, so a run either lands completely or not at all.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use super::catalog::MigrationCatalog;
use super::definitions::{
    BatchStatus, CatalogEntry, MigrationConfig, MigrationDirection, MigrationId,
    MigrationRunResult, MigrationStatus,
};
use super::executor::{Batch, Query, StatementExecutor};
use super::loader::{MigrationLoader, SqlFileLoader};
use super::version_store::VersionStore;
use crate::error::{MigrateError, MigrateResult};

/// Migration runner that executes migrations against a database
pub struct MigrationRunner {
    catalog: MigrationCatalog,
    store: VersionStore,
    loader: Arc<dyn MigrationLoader>,
    executor: Arc<dyn StatementExecutor>,
}

impl MigrationRunner {
    /// Create a runner reading `.sql` artifacts from the configured directory
    pub fn new(
        config: &MigrationConfig,
        executor: Arc<dyn StatementExecutor>,
    ) -> MigrateResult<Self> {
        Ok(Self {
            catalog: MigrationCatalog::new(&config.migrations_dir),
            store: VersionStore::new(&config.migrations_table)?,
            loader: Arc::new(SqlFileLoader),
            executor,
        })
    }

    /// Replace the artifact loader
    pub fn with_loader(mut self, loader: Arc<dyn MigrationLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub(crate) fn executor(&self) -> &dyn StatementExecutor {
        self.executor.as_ref()
    }

    /// Drop and recreate the version-tracking table
    pub async fn setup(&self) -> MigrateResult<()> {
        let batch: Batch = self.store.setup_queries().into_iter().collect();
        self.executor.execute_batch(&batch).await?;
        tracing::info!("Schema migrations table \"{}\" created", self.store.table());
        Ok(())
    }

    /// Apply every pending migration up to and including `ceiling`
    pub async fn run(&self, ceiling: Option<&MigrationId>) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let finish = |status, applied| MigrationRunResult {
            status,
            applied,
            execution_time_ms: start_time.elapsed().as_millis(),
        };

        let candidates = self.catalog.list(ceiling, false)?;
        if candidates.is_empty() {
            return Ok(finish(BatchStatus::NothingToDo, Vec::new()));
        }

        self.ensure_setup().await?;
        let latest = self.store.latest(self.executor()).await?;

        if let (Some(target), Some(latest)) = (ceiling, latest.as_ref()) {
            if target <= latest {
                return Err(MigrateError::AlreadyApplied {
                    target: target.clone(),
                    latest: latest.clone(),
                });
            }
        }

        self.warn_skipped(&candidates, latest.as_ref()).await?;

        let pending: Vec<CatalogEntry> = candidates
            .into_iter()
            .filter(|entry| Some(&entry.id) > latest.as_ref())
            .collect();
        if pending.is_empty() {
            return Ok(finish(BatchStatus::UpToDate, Vec::new()));
        }

        let mut batch = self.build_batch(&pending, MigrationDirection::Up)?;
        batch.extend(self.store.record_applied(pending.iter().map(|entry| &entry.id)));

        tracing::debug!(
            migrations = pending.len(),
            statements = batch.len(),
            "Applying migrations in one transaction"
        );
        self.executor.execute_batch(&batch).await?;

        for entry in &pending {
            tracing::info!("Migrated {}", entry.file_name());
        }
        Ok(finish(BatchStatus::Completed, pending))
    }

    /// Get migration status for all discovered and recorded migrations
    pub async fn status(&self) -> MigrateResult<Vec<(MigrationId, Option<CatalogEntry>, MigrationStatus)>> {
        self.ensure_setup().await?;
        let applied: HashSet<MigrationId> =
            self.store.applied(self.executor()).await?.into_iter().collect();
        let discovered = self.catalog.list(None, false)?;

        let known: HashSet<&MigrationId> = discovered.iter().map(|entry| &entry.id).collect();
        let mut orphaned: Vec<MigrationId> = applied
            .iter()
            .filter(|id| !known.contains(id))
            .cloned()
            .collect();
        orphaned.sort();

        let mut status_list: Vec<_> = discovered
            .iter()
            .map(|entry| {
                let status = if applied.contains(&entry.id) {
                    MigrationStatus::Applied
                } else {
                    MigrationStatus::Pending
                };
                (entry.id.clone(), Some(entry.clone()), status)
            })
            .collect();
        status_list.extend(
            orphaned
                .into_iter()
                .map(|id| (id, None, MigrationStatus::Orphaned)),
        );
        status_list.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(status_list)
    }

    /// Fail fast when `setup` was never run
    pub(crate) async fn ensure_setup(&self) -> MigrateResult<()> {
        if !self.store.exists(self.executor()).await? {
            return Err(MigrateError::SetupMissing {
                table: self.store.table().to_string(),
            });
        }
        Ok(())
    }

    /// Load each migration and concatenate its statements for `direction`
    pub(crate) fn build_batch(
        &self,
        entries: &[CatalogEntry],
        direction: MigrationDirection,
    ) -> MigrateResult<Batch> {
        let mut batch = Batch::new();
        for entry in entries {
            let source = self.loader.load(&entry.location)?;
            let statements = match direction {
                MigrationDirection::Up => source.up,
                MigrationDirection::Down => source.down,
            };
            batch.extend(statements.into_iter().map(Query::raw));
        }
        Ok(batch)
    }

    /// Artifacts older than the latest applied id are never applied forward
    async fn warn_skipped(
        &self,
        candidates: &[CatalogEntry],
        latest: Option<&MigrationId>,
    ) -> MigrateResult<()> {
        let Some(latest) = latest else {
            return Ok(());
        };
        let older: Vec<&CatalogEntry> = candidates.iter().filter(|e| &e.id < latest).collect();
        if older.is_empty() {
            return Ok(());
        }

        let applied: HashSet<MigrationId> =
            self.store.applied(self.executor()).await?.into_iter().collect();
        for entry in older.into_iter().filter(|e| !applied.contains(&e.id)) {
            tracing::warn!(
                "Skipping {}: it is older than the latest applied migration {}",
                entry.file_name(),
                latest
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::MigrationSource;
    use crate::testing::{write_migration, MemoryExecutor};
    use std::path::Path;
    use tempfile::TempDir;

    fn setup(executor: Arc<MemoryExecutor>) -> (TempDir, MigrationRunner) {
        let dir = TempDir::new().unwrap();
        let config = MigrationConfig {
            migrations_dir: dir.path().to_path_buf(),
            migrations_table: "schema_migrations".to_string(),
        };
        let runner = MigrationRunner::new(&config, executor).unwrap();
        (dir, runner)
    }

    fn id(s: &str) -> MigrationId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_applies_in_ascending_order_in_one_transaction() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200103000000", "t3");
        write_migration(dir.path(), "20200101000000", "t1");
        write_migration(dir.path(), "20200102000000", "t2");

        let result = runner.run(None).await.unwrap();

        assert_eq!(result.status, BatchStatus::Completed);
        let applied: Vec<_> = result.applied.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(applied, ["t1", "t2", "t3"]);
        assert_eq!(
            executor.executed(),
            [
                "CREATE TABLE t1 (id int)",
                "CREATE TABLE t2 (id int)",
                "CREATE TABLE t3 (id int)"
            ]
        );
        assert_eq!(executor.committed_batches(), 1);
        assert_eq!(
            executor.versions(),
            ["20200101000000", "20200102000000", "20200103000000"]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200101000000", "t1");

        runner.run(None).await.unwrap();
        let again = runner.run(None).await.unwrap();

        assert_eq!(again.status, BatchStatus::UpToDate);
        assert!(again.applied.is_empty());
        assert_eq!(executor.committed_batches(), 1);
    }

    #[tokio::test]
    async fn test_nothing_to_migrate_without_artifacts() {
        // No tracking table either: discovery comes first.
        let executor = Arc::new(MemoryExecutor::new());
        let (_dir, runner) = setup(executor.clone());

        let result = runner.run(None).await.unwrap();
        assert_eq!(result.status, BatchStatus::NothingToDo);
    }

    #[tokio::test]
    async fn test_failure_in_last_migration_applies_nothing() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200101000000", "t1");
        write_migration(dir.path(), "20200102000000", "t2");
        write_migration(dir.path(), "20200103000000", "t3");
        executor.fail_on("CREATE TABLE t3");

        let err = runner.run(None).await.unwrap_err();

        assert!(matches!(err, MigrateError::Execution(_)));
        assert!(executor.versions().is_empty());
        assert!(executor.executed().is_empty());
        assert_eq!(executor.committed_batches(), 0);
    }

    #[tokio::test]
    async fn test_requires_setup() {
        let executor = Arc::new(MemoryExecutor::new());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200101000000", "t1");

        let err = runner.run(None).await.unwrap_err();
        assert!(matches!(err, MigrateError::SetupMissing { .. }));
        assert_eq!(executor.committed_batches(), 0);
    }

    #[tokio::test]
    async fn test_ceiling_equal_to_latest_is_already_applied() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200101000000", "t1");
        write_migration(dir.path(), "20200102000000", "t2");
        executor.seed_versions(["20200101000000"]);

        let err = runner.run(Some(&id("20200101000000"))).await.unwrap_err();

        assert!(matches!(err, MigrateError::AlreadyApplied { .. }));
        assert_eq!(executor.versions(), ["20200101000000"]);
        assert_eq!(executor.committed_batches(), 0);
    }

    #[tokio::test]
    async fn test_ceiling_limits_applied_set() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200101000000", "t1");
        write_migration(dir.path(), "20200102000000", "t2");
        write_migration(dir.path(), "20200103000000", "t3");

        let result = runner.run(Some(&id("20200102000000"))).await.unwrap();

        assert_eq!(result.applied.len(), 2);
        assert_eq!(executor.versions(), ["20200101000000", "20200102000000"]);

        let rest = runner.run(None).await.unwrap();
        assert_eq!(rest.applied.len(), 1);
        assert_eq!(rest.applied[0].name, "t3");
    }

    #[tokio::test]
    async fn test_older_unapplied_artifacts_are_skipped() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200101000000", "late_arrival");
        write_migration(dir.path(), "20200105000000", "t5");
        executor.seed_versions(["20200102000000"]);

        let result = runner.run(None).await.unwrap();

        let applied: Vec<_> = result.applied.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(applied, ["t5"]);
        assert!(!executor.versions().contains(&"20200101000000".to_string()));
    }

    #[tokio::test]
    async fn test_custom_loader() {
        struct Fixed;
        impl MigrationLoader for Fixed {
            fn load(&self, _location: &Path) -> MigrateResult<MigrationSource> {
                Ok(MigrationSource {
                    up: vec!["SELECT 'up'".to_string()],
                    down: vec!["SELECT 'down'".to_string()],
                })
            }
        }

        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        let runner = runner.with_loader(Arc::new(Fixed));
        write_migration(dir.path(), "20200101000000", "t1");

        runner.run(None).await.unwrap();
        assert_eq!(executor.executed(), ["SELECT 'up'"]);
    }

    #[tokio::test]
    async fn test_setup_recreates_table() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        executor.seed_versions(["20200101000000"]);
        let (_dir, runner) = setup(executor.clone());

        runner.setup().await.unwrap();

        assert!(runner.store().exists(executor.as_ref()).await.unwrap());
        assert!(executor.versions().is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_each_migration() {
        let executor = Arc::new(MemoryExecutor::provisioned());
        let (dir, runner) = setup(executor.clone());
        write_migration(dir.path(), "20200101000000", "t1");
        write_migration(dir.path(), "20200102000000", "t2");
        executor.seed_versions(["20200101000000", "20191231000000"]);

        let status = runner.status().await.unwrap();

        let summary: Vec<_> = status.iter().map(|(id, _, s)| (id.as_str(), s.clone())).collect();
        assert_eq!(
            summary,
            [
                ("20191231000000", MigrationStatus::Orphaned),
                ("20200101000000", MigrationStatus::Applied),
                ("20200102000000", MigrationStatus::Pending),
            ]
        );
    }
}
