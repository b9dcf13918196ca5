//! Migration Catalog - read-only discovery of migration artifacts
//!
//! Artifacts live in one directory and are named `<id>_<name>.sql`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::definitions::{CatalogEntry, MigrationId};
use crate::error::{MigrateError, MigrateResult};

/// File extension of migration artifacts
pub const ARTIFACT_EXTENSION: &str = "sql";

/// Scans the migrations directory
#[derive(Debug, Clone)]
pub struct MigrationCatalog {
    migrations_dir: PathBuf,
}

impl MigrationCatalog {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// List discovered migrations ordered by id.
    ///
    /// `upper_bound` keeps only ids at or below it; `reverse` lists newest first.
    pub fn list(
        &self,
        upper_bound: Option<&MigrationId>,
        reverse: bool,
    ) -> MigrateResult<Vec<CatalogEntry>> {
        let mut entries = self.scan()?;
        if let Some(bound) = upper_bound {
            entries.retain(|id, _| id <= bound);
        }

        let mut listed: Vec<CatalogEntry> = entries.into_values().collect();
        if reverse {
            listed.reverse();
        }
        Ok(listed)
    }

    /// Find the artifact of one id
    pub fn find(&self, id: &MigrationId) -> MigrateResult<Option<CatalogEntry>> {
        Ok(self.scan()?.remove(id))
    }

    fn scan(&self) -> MigrateResult<BTreeMap<MigrationId, CatalogEntry>> {
        if !self.migrations_dir.exists() {
            tracing::debug!(
                "Migrations directory {} does not exist",
                self.migrations_dir.display()
            );
            return Ok(BTreeMap::new());
        }

        let read_error = |source| MigrateError::ArtifactRead {
            path: self.migrations_dir.clone(),
            source,
        };

        let mut entries: BTreeMap<MigrationId, CatalogEntry> = BTreeMap::new();
        for dir_entry in fs::read_dir(&self.migrations_dir).map_err(read_error)? {
            let path = dir_entry.map_err(read_error)?.path();
            if !path.is_file() {
                continue;
            }

            let Some(entry) = parse_artifact_path(&path) else {
                tracing::debug!("Skipping {}: not a migration file", path.display());
                continue;
            };

            if let Some(existing) = entries.get(&entry.id) {
                return Err(MigrateError::DuplicateId {
                    id: entry.id,
                    first: existing.location.clone(),
                    second: path,
                });
            }
            entries.insert(entry.id.clone(), entry);
        }

        tracing::debug!(
            "Discovered {} migration(s) in {}",
            entries.len(),
            self.migrations_dir.display()
        );
        Ok(entries)
    }
}

/// Parse `<id>_<name>.sql` into a catalog entry
pub fn parse_artifact_path(path: &Path) -> Option<CatalogEntry> {
    if path.extension()? != ARTIFACT_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (id, name) = stem.split_once('_')?;
    if name.is_empty() {
        return None;
    }

    Some(CatalogEntry {
        id: id.parse().ok()?,
        name: name.to_string(),
        location: path.to_path_buf(),
    })
}
