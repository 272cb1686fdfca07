//! Error types for kv-core

use crate::migration::MigrationId;
use thiserror::Error;

/// Configuration and I/O errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Failed to parse configuration file
    #[error("[C002] Failed to parse config {path}: {source}")]
    ConfigParseError {
        path: String,
        source: serde_yaml::Error,
    },

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: IO error with file path context
    #[error("[C004] Failed to access '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C005: Invalid migration name passed to `generate`
    #[error("[C005] Invalid migration name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Structural errors discovered while loading the migration registry.
///
/// All of these are raised before any database is touched.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// R001: Two descriptors share an id
    #[error("[R001] Duplicate migration id {id}: '{first}' and '{second}'")]
    DuplicateId {
        id: MigrationId,
        first: String,
        second: String,
    },

    /// R002: Two descriptors share a name
    #[error("[R002] Duplicate migration name '{name}' (ids {first} and {second})")]
    DuplicateName {
        name: String,
        first: MigrationId,
        second: MigrationId,
    },

    /// R003: Migrations directory does not exist
    #[error("[R003] Migrations directory not found: {path}")]
    SourceNotFound { path: String },

    /// R004: A migration directory name cannot be parsed into id and name
    #[error("[R004] Invalid migration directory name '{entry}': expected m<YYYYMMDD>_<hhmmss>_<name> or <digits>_<name>")]
    InvalidMigrationName { entry: String },

    /// R005: A migration directory has no up script
    #[error("[R005] Migration '{entry}' is missing its up.sql script")]
    MissingUpScript { entry: String },

    /// R006: Reading a migration file failed
    #[error("[R006] Failed to read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Errors raised while computing a migration plan.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlannerError {
    /// P001: A migration selected for revert has no down action
    #[error("[P001] Migration {0} is irreversible: it has no down action")]
    Irreversible(MigrationId),

    /// P002: History references a migration that is no longer in the registry
    #[error("[P002] History references migration {0}, which is no longer in the registry")]
    OrphanedHistory(MigrationId),
}
