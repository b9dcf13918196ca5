use anyhow::Context;
use rivet_migrate::{BatchStatus, MigrationGenerator, MigrationId, MigrationRollback, MigrationStatus};
use std::env;
use std::path::Path;

use super::AppContext;

pub fn generate(app: &AppContext, name: &str) -> anyhow::Result<()> {
    let generator = MigrationGenerator::new(&app.config().migrations_dir);
    let path = generator.create(name)?;

    tracing::info!("Created {}", display_path(&path));
    Ok(())
}

pub async fn run(app: &AppContext, ceiling: Option<&MigrationId>) -> anyhow::Result<()> {
    let runner = app.runner()?;
    let result = runner
        .run(ceiling)
        .await
        .context("Database migration failed")?;

    match result.status {
        BatchStatus::NothingToDo => tracing::info!("Nothing to migrate."),
        BatchStatus::UpToDate => tracing::info!("Already up to date."),
        BatchStatus::Completed => tracing::info!(
            migrations = result.applied.len(),
            elapsed_ms = result.execution_time_ms as u64,
            "Migrations applied."
        ),
    }
    Ok(())
}

pub async fn rollback(app: &AppContext, floor: Option<&MigrationId>) -> anyhow::Result<()> {
    let runner = app.runner()?;
    let result = runner
        .rollback(floor)
        .await
        .context("Database migration rollback failed")?;

    match result.status {
        BatchStatus::NothingToDo => tracing::info!("Nothing to rollback."),
        BatchStatus::UpToDate => tracing::info!("Already up to date."),
        BatchStatus::Completed => tracing::info!(
            migrations = result.rolled_back.len(),
            elapsed_ms = result.execution_time_ms as u64,
            "Migrations rolled back."
        ),
    }
    Ok(())
}

pub async fn status(app: &AppContext) -> anyhow::Result<()> {
    let runner = app.runner()?;
    let statuses = runner
        .status()
        .await
        .context("Failed to read migration status")?;

    println!("Migration Status:");
    println!("================");

    if statuses.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    for (id, entry, status) in &statuses {
        let label = match status {
            MigrationStatus::Applied => "applied",
            MigrationStatus::Pending => "pending",
            MigrationStatus::Orphaned => "missing",
        };
        let name = entry
            .as_ref()
            .map(|entry| entry.file_name())
            .unwrap_or_else(|| format!("{} (no migration file)", id));
        println!("  [{:<7}] {}", label, name);
    }

    let pending = statuses
        .iter()
        .filter(|(_, _, status)| *status == MigrationStatus::Pending)
        .count();
    println!();
    println!("{} migration(s), {} pending", statuses.len(), pending);
    Ok(())
}

/// Path relative to the working directory when possible, `./`-prefixed
fn display_path(path: &Path) -> String {
    let relative = if path.is_absolute() {
        env::current_dir()
            .ok()
            .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
    } else {
        Some(path.to_path_buf())
    };

    match relative {
        Some(relative) if !relative.starts_with("..") && !relative.starts_with(".") => {
            format!("./{}", relative.display())
        }
        Some(relative) => relative.display().to_string(),
        None => path.display().to_string(),
    }
}
