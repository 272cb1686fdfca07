//! Error types for kv-db

use kv_core::MigrationId;
use std::time::Duration;
use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Statement execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// BEGIN, COMMIT or ROLLBACK failed (D003)
    #[error("[D003] Transaction control failed: {0}")]
    TransactionError(String),

    /// Lock wait exceeded its timeout (D004)
    #[error("[D004] Timed out after {timeout:?} waiting for migration lock '{key}'; another migration run is in progress")]
    LockTimeout { key: String, timeout: Duration },

    /// Not implemented (D005)
    #[error("[D005] Feature not implemented for {backend}: {feature}")]
    NotImplemented { backend: String, feature: String },

    /// Mutex poisoned (D006)
    #[error("[D006] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D007)
    #[error("[D007] Internal database error: {0}")]
    Internal(String),

    /// The lease expired and another holder took the lock (D008)
    #[error("[D008] Migration lock '{key}' was lost to another holder")]
    LockLost { key: String },

    /// Database URL could not be understood (D009)
    #[error("[D009] Invalid database URL '{0}'")]
    InvalidUrl(String),

    /// Table name is not a plain SQL identifier (D010)
    #[error("[D010] Invalid table name '{0}'")]
    InvalidIdentifier(String),

    /// History table bookkeeping error
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

/// History table bookkeeping errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HistoryError {
    /// H001: Recording a migration that already has a history row
    #[error("[H001] Migration {0} is already recorded as applied")]
    AlreadyApplied(MigrationId),

    /// H002: Removing a migration that has no history row
    #[error("[H002] Migration {0} is not recorded as applied")]
    NotApplied(MigrationId),
}

/// A migration run halted on a failed step.
///
/// Steps before the failed one are committed; the failed step left no
/// schema change and no history row behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[X001] Migration {id} ({name}) failed after {completed} completed step(s): {message}")]
pub struct ExecutionError {
    pub id: MigrationId,
    pub name: String,
    pub message: String,
    pub completed: usize,
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::ExecutionError(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError(err.to_string())
            }
            other => DbError::ExecutionError(other.to_string()),
        }
    }
}
