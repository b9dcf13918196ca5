use anyhow::Context;

use super::AppContext;

/// Drop and recreate the schema migrations table
pub async fn setup(app: &AppContext) -> anyhow::Result<()> {
    let runner = app.runner()?;
    runner.setup().await.context("Database setup failed")?;

    tracing::info!("Database initialized.");
    Ok(())
}
