//! Backend trait definitions

use crate::error::DbResult;
use crate::lock::LockOptions;
use async_trait::async_trait;
use kv_core::{applied_ids, HistoryRecord, MigrationId};
use std::collections::BTreeSet;

/// Durable record of which migrations are applied.
///
/// `record` and `remove` run on the same connection as [`SchemaExecutor`], so
/// inside an open transaction they commit or roll back together with the
/// schema change.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Create the history and lock tables if missing
    async fn ensure_schema(&self) -> DbResult<()>;

    /// All history rows, ordered by migration id
    async fn applied(&self) -> DbResult<Vec<HistoryRecord>>;

    /// Set of applied migration ids
    async fn applied_ids(&self) -> DbResult<BTreeSet<MigrationId>> {
        Ok(applied_ids(&self.applied().await?))
    }

    /// Insert a history row
    async fn record(&self, record: &HistoryRecord) -> DbResult<()>;

    /// Delete the history row for `id`
    async fn remove(&self, id: MigrationId) -> DbResult<()>;
}

/// Cross-process mutual exclusion for migration runs.
#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    /// Block until the lock is held or `options.timeout` elapses
    async fn acquire_lock(&self, options: &LockOptions) -> DbResult<()>;

    /// Confirm the lock is still held, renewing any lease
    async fn refresh_lock(&self) -> DbResult<()>;

    /// Release the lock; a no-op when not held
    async fn release_lock(&self) -> DbResult<()>;
}

/// Transaction control and script execution.
#[async_trait]
pub trait SchemaExecutor: Send + Sync {
    async fn begin(&self) -> DbResult<()>;

    async fn commit(&self) -> DbResult<()>;

    async fn rollback(&self) -> DbResult<()>;

    /// Execute a script of one or more statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;
}

/// Everything the executor needs from a database.
pub trait MigrationBackend: HistoryStore + AdvisoryLock + SchemaExecutor {
    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
