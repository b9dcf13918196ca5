//! Migration Rollback - reverts applied migrations
//!
//! Mirrors the runner with the direction reversed: down statements run newest
//! first and the version rows are deleted in the same transaction.

use std::time::Instant;

use super::definitions::{
    BatchStatus, CatalogEntry, MigrationDirection, MigrationId, RollbackResult,
};
use super::runner::MigrationRunner;
use crate::error::{MigrateError, MigrateResult};

/// Extension trait for MigrationRunner to add rollback functionality
#[allow(async_fn_in_trait)]
pub trait MigrationRollback {
    /// Revert applied migrations down to `floor` inclusive.
    ///
    /// Without a floor only the latest applied migration is reverted.
    async fn rollback(&self, floor: Option<&MigrationId>) -> MigrateResult<RollbackResult>;
}

impl MigrationRollback for MigrationRunner {
    async fn rollback(&self, floor: Option<&MigrationId>) -> MigrateResult<RollbackResult> {
        let start_time = Instant::now();
        let finish = |status, rolled_back| RollbackResult {
            status,
            rolled_back,
            execution_time_ms: start_time.elapsed().as_millis(),
        };

        self.ensure_setup().await?;

        let Some(latest) = self.store().latest(self.executor()).await? else {
            return Ok(finish(BatchStatus::NothingToDo, Vec::new()));
        };

        if let Some(floor) = floor {
            if floor > &latest {
                return Err(MigrateError::NotYetApplied {
                    target: floor.clone(),
                    latest,
                });
            }
        }
        let target = floor.unwrap_or(&latest);

        let candidates = self.catalog().list(Some(&latest), true)?;
        let selected: Vec<CatalogEntry> = candidates
            .into_iter()
            .filter(|entry| &entry.id >= target)
            .collect();

        // Every applied id in range needs its down statements.
        let applied = self.store().applied(self.executor()).await?;
        let reverting: Vec<&MigrationId> = applied.iter().filter(|id| *id >= target).collect();
        if let Some(missing) = reverting
            .iter()
            .find(|id| !selected.iter().any(|entry| &entry.id == **id))
        {
            return Err(MigrateError::MissingArtifact((*missing).clone()));
        }

        // Artifacts in range that were never applied are left alone.
        let selected: Vec<CatalogEntry> = selected
            .into_iter()
            .filter(|entry| reverting.contains(&&entry.id))
            .collect();
        if selected.is_empty() {
            return Ok(finish(BatchStatus::UpToDate, Vec::new()));
        }

        let mut batch = self.build_batch(&selected, MigrationDirection::Down)?;
        batch.extend(self.store().record_reverted(selected.iter().map(|entry| &entry.id)));

        tracing::debug!(
            migrations = selected.len(),
            statements = batch.len(),
            "Reverting migrations in one transaction"
        );
        self.executor().execute_batch(&batch).await?;

        for entry in &selected {
            tracing::info!("Rolled back {}", entry.file_name());
        }
        Ok(finish(BatchStatus::Completed, selected))
    }
}
