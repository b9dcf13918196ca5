//! Migration Generator - creates new migration artifacts from a template

use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{MigrationCatalog, ARTIFACT_EXTENSION};
use crate::definitions::MigrationId;
use crate::error::{MigrateError, MigrateResult};

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Writes new migration files into the migrations directory
#[derive(Clone)]
pub struct MigrationGenerator {
    migrations_dir: PathBuf,
    clock: Clock,
}

impl fmt::Debug for MigrationGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationGenerator")
            .field("migrations_dir", &self.migrations_dir)
            .finish_non_exhaustive()
    }
}

impl MigrationGenerator {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Create a new migration artifact and return its path
    pub fn create(&self, name: &str) -> MigrateResult<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MigrateError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(&self.migrations_dir).map_err(|e| MigrateError::ArtifactWrite {
            path: self.migrations_dir.clone(),
            source: e,
        })?;

        let created_at = (self.clock)();
        let id = MigrationId::from_datetime(created_at);

        // Ids are unique across the directory.
        if let Some(existing) = MigrationCatalog::new(&self.migrations_dir).find(&id)? {
            return Err(MigrateError::IdCollision {
                id,
                existing: existing.location,
            });
        }

        let filename = format!("{}_{}.{}", id, slug, ARTIFACT_EXTENSION);
        let destination = self.migrations_dir.join(&filename);
        let staging = self.migrations_dir.join(format!(".{}.tmp", filename));
        let template = migration_template(&slug, &id, created_at);

        let write_error = |e| MigrateError::ArtifactWrite {
            path: destination.clone(),
            source: e,
        };
        fs::write(&staging, template).map_err(write_error)?;
        if let Err(e) = fs::rename(&staging, &destination) {
            let _ = fs::remove_file(&staging);
            return Err(write_error(e));
        }

        tracing::debug!("Created migration {}", destination.display());
        Ok(destination)
    }
}

/// Normalize user input to a snake_case identifier.
///
/// `createUsers`, `Create Users` and `create-users` all become `create_users`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            let boundary = ch.is_ascii_uppercase()
                && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
            if boundary && !slug.ends_with('_') {
                slug.push('_');
            }
            slug.push(ch.to_ascii_lowercase());
        } else if matches!(ch, ' ' | '_' | '-' | '.' | '/') && !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
        previous = Some(ch);
    }

    slug.trim_end_matches('_').to_string()
}

fn migration_template(slug: &str, id: &MigrationId, created_at: DateTime<Utc>) -> String {
    format!(
        "-- Migration: {slug}\n\
         -- ID: {id}\n\
         -- Created: {created}\n\
         \n\
         -- migrate:up\n\
         DROP TABLE IF EXISTS {slug};\n\
         CREATE TABLE {slug} (\n\
        \x20 id serial PRIMARY KEY,\n\
        \x20 created_at timestamp with time zone,\n\
        \x20 updated_at timestamp with time zone\n\
         );\n\
         \n\
         -- migrate:down\n\
         DROP TABLE IF EXISTS {slug};\n",
        created = created_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}
