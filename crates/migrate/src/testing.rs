//! In-memory statement executor for engine tests
//!
//! Understands the version-store queries, records every other statement it
//! is given, and applies batches all-or-nothing.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{MigrateError, MigrateResult};
use crate::executor::{Batch, Query, StatementExecutor};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    table: Option<String>,
    versions: BTreeSet<String>,
    executed: Vec<String>,
    committed_batches: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryExecutor {
    state: Mutex<MemoryState>,
    fail_on: Mutex<Option<String>>,
}

impl MemoryExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Executor with the tracking table already provisioned
    pub(crate) fn provisioned() -> Self {
        let executor = Self::new();
        executor.provision("schema_migrations");
        executor
    }

    pub(crate) fn provision(&self, table: &str) {
        self.state.lock().unwrap().table = Some(table.to_string());
    }

    pub(crate) fn seed_versions<'a>(&self, versions: impl IntoIterator<Item = &'a str>) {
        let mut state = self.state.lock().unwrap();
        state.versions.extend(versions.into_iter().map(str::to_string));
    }

    /// Make any statement containing `needle` fail
    pub(crate) fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    pub(crate) fn versions(&self) -> Vec<String> {
        self.state.lock().unwrap().versions.iter().cloned().collect()
    }

    /// Migration statements that were committed, in execution order
    pub(crate) fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub(crate) fn committed_batches(&self) -> usize {
        self.state.lock().unwrap().committed_batches
    }

    fn apply(&self, state: &mut MemoryState, query: &Query) -> MigrateResult<()> {
        if let Some(needle) = self.fail_on.lock().unwrap().as_deref() {
            if query.text().contains(needle) {
                return Err(MigrateError::Execution(format!(
                    "simulated failure in {:?}",
                    query.text()
                )));
            }
        }

        let text = query.text();
        if text.starts_with("DROP TABLE IF EXISTS \"") && is_tracking(state, text, true) {
            state.table = None;
            state.versions.clear();
        } else if text.starts_with("CREATE TABLE \"") && text.contains("\"version\"") {
            let table = text.split('"').nth(1).unwrap_or_default().to_string();
            state.table = Some(table);
        } else if text.starts_with("INSERT INTO \"") && is_tracking(state, text, false) {
            let version = query.params()[0].clone();
            if !state.versions.insert(version.clone()) {
                return Err(MigrateError::Execution(format!(
                    "duplicate key value violates unique constraint: {}",
                    version
                )));
            }
        } else if text.starts_with("DELETE FROM \"") && is_tracking(state, text, false) {
            state.versions.remove(&query.params()[0]);
        } else {
            state.executed.push(text.to_string());
        }
        Ok(())
    }
}

fn is_tracking(state: &MemoryState, text: &str, allow_missing: bool) -> bool {
    let table = text.split('"').nth(1).unwrap_or_default();
    match &state.table {
        Some(current) => current == table,
        None => allow_missing,
    }
}

#[async_trait]
impl StatementExecutor for MemoryExecutor {
    async fn fetch_column(&self, query: &Query) -> MigrateResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let text = query.text();

        if text.contains("information_schema.tables") {
            let wanted = query.params().first().cloned().unwrap_or_default();
            return Ok(state.table.iter().filter(|t| **t == wanted).cloned().collect());
        }

        if state.table.is_none() {
            return Err(MigrateError::Query("relation does not exist".to_string()));
        }
        if text.contains("ORDER BY version DESC LIMIT 1") {
            return Ok(state.versions.iter().next_back().cloned().into_iter().collect());
        }
        Ok(state.versions.iter().cloned().collect())
    }

    async fn execute_batch(&self, batch: &Batch) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        let mut working = state.clone();
        for query in batch.iter() {
            self.apply(&mut working, query)?;
        }
        working.committed_batches += 1;
        *state = working;
        Ok(())
    }
}

/// Write `<id>_<table>.sql` creating and dropping a table of that name
pub(crate) fn write_migration(dir: &Path, id: &str, table: &str) -> PathBuf {
    let path = dir.join(format!("{}_{}.sql", id, table));
    fs::write(
        &path,
        format!(
            "-- migrate:up\nCREATE TABLE {table} (id int);\n\
             -- migrate:down\nDROP TABLE {table};\n"
        ),
    )
    .unwrap();
    path
}
