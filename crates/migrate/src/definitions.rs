//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system:
//! migration ids, catalog entries, loaded migration sources, engine
//! configuration and run results.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::MigrateError;

/// Format of a migration id: UTC wall-clock time, second resolution
pub const MIGRATION_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Unique, lexically sortable migration identifier (`YYYYMMDDHHMMSS`)
///
/// Ids are fixed-width, so string ordering is chronological ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MigrationId(String);

impl MigrationId {
    /// Build the id for a point in time
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(MIGRATION_ID_FORMAT).to_string())
    }

    /// Id for the current UTC time
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The instant this id encodes
    pub fn timestamp(&self) -> DateTime<Utc> {
        // Construction guarantees the format parses.
        NaiveDateTime::parse_from_str(&self.0, MIGRATION_ID_FORMAT)
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
            .unwrap_or_default()
    }
}

impl FromStr for MigrationId {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit());
        if !well_formed || NaiveDateTime::parse_from_str(s, MIGRATION_ID_FORMAT).is_err() {
            return Err(MigrateError::InvalidId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for MigrationId {
    type Error = MigrateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MigrationId> for String {
    fn from(id: MigrationId) -> Self {
        id.0
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A migration artifact discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Migration id parsed from the file name
    pub id: MigrationId,
    /// Slug following the id in the file name
    pub name: String,
    /// Path to the artifact
    pub location: PathBuf,
}

impl CatalogEntry {
    /// File name of the artifact, for reporting
    pub fn file_name(&self) -> String {
        self.location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}_{}", self.id, self.name))
    }
}

/// The forward and reverse statements of one migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSource {
    /// SQL statements to apply the migration
    pub up: Vec<String>,
    /// SQL statements to rollback the migration
    pub down: Vec<String>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking applied versions
    pub migrations_table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("db/migrations"),
            migrations_table: "schema_migrations".to_string(),
        }
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration (run UP statements)
    Up,
    /// Rollback the migration (run DOWN statements)
    Down,
}

/// How a run or rollback invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// No migrations discovered, or none applied when rolling back
    NothingToDo,
    /// Candidates exist but none needed work
    UpToDate,
    /// The batch committed
    Completed,
}

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationRunResult {
    pub status: BatchStatus,
    /// Applied migrations, ascending
    pub applied: Vec<CatalogEntry>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Result of rolling back migrations
#[derive(Debug)]
pub struct RollbackResult {
    pub status: BatchStatus,
    /// Reverted migrations, newest first
    pub rolled_back: Vec<CatalogEntry>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied,
    /// Recorded as applied but no artifact was found
    Orphaned,
}
