//! Error types for the migration engine
//!
//! Every failure the catalog, generator, runner or rollback can produce.
//! "Nothing to do" situations are reported through result statuses, never
//! through this type.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::definitions::MigrationId;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// The version-tracking table has not been provisioned
    #[error(
        "Schema migrations table \"{table}\" could not be found. \
         Run `rivet setup` before running `rivet migrate`"
    )]
    SetupMissing { table: String },

    /// A migrate ceiling at or below the latest applied version
    #[error(
        "You are trying to run migrations already applied. Your latest applied migration \
         has a timestamp of \"{latest}\" (requested {target}). Rollback your migrations \
         before trying to apply them again"
    )]
    AlreadyApplied {
        target: MigrationId,
        latest: MigrationId,
    },

    /// A rollback floor above the latest applied version
    #[error(
        "You are trying to rollback migrations not yet applied. Your latest applied \
         migration has a timestamp of \"{latest}\" (requested {target})"
    )]
    NotYetApplied {
        target: MigrationId,
        latest: MigrationId,
    },

    #[error("Can't create migration {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't create migration: id {id} is already used by {existing}")]
    IdCollision { id: MigrationId, existing: PathBuf },

    #[error("Invalid migration name {0:?}: it must contain at least one letter or digit")]
    InvalidName(String),

    #[error("Failed to read migrations from {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid migration file {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Duplicate migration id {id}: {first} and {second}")]
    DuplicateId {
        id: MigrationId,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Migration file not found for applied migration {0}")]
    MissingArtifact(MigrationId),

    #[error("Invalid migration id {0:?}: expected a YYYYMMDDHHMMSS timestamp")]
    InvalidId(String),

    #[error("Invalid migrations table name {0:?}")]
    InvalidTableName(String),

    /// Backing store unreachable
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// A statement of an atomic batch failed; the batch was rolled back
    #[error("Statement execution failed, transaction rolled back: {0}")]
    Execution(String),

    /// A version-store read failed
    #[error("Query failed: {0}")]
    Query(String),
}

impl MigrateError {
    /// Whether the failure left the database untouched because nothing was attempted
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            MigrateError::SetupMissing { .. }
                | MigrateError::AlreadyApplied { .. }
                | MigrateError::NotYetApplied { .. }
                | MigrateError::MissingArtifact(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_missing_mentions_setup_command() {
        let err = MigrateError::SetupMissing {
            table: "schema_migrations".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("schema_migrations"));
        assert!(message.contains("rivet setup"));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_already_applied_reports_latest() {
        let latest: MigrationId = "20200101000000".parse().unwrap();
        let err = MigrateError::AlreadyApplied {
            target: latest.clone(),
            latest,
        };
        assert!(err.to_string().contains("\"20200101000000\""));
        assert!(err.is_precondition());
        assert!(!MigrateError::Execution("boom".into()).is_precondition());
    }
}
