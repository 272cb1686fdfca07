//! DuckDB migration backend
//!
//! DuckDB has transactional DDL, so every migration step runs inside one
//! transaction together with its history row.
//!
//! DuckDB allows a single read-write process per database file and enforces
//! it with an OS file lock, so across processes the file lock serialises
//! migration runs: [`DuckDbBackend::open_waiting`] polls until the file is
//! free. Within one process, connections cloned with `try_clone` share the
//! file and exclude each other through a lease row in the lock table, claimed
//! with a conditional UPDATE and renewed before each step.

use crate::error::{DbError, DbResult, HistoryError};
use crate::lock::{new_holder_id, poll_acquire, poll_until, LockOptions};
use crate::tables::HistoryTables;
use crate::traits::{AdvisoryLock, HistoryStore, MigrationBackend, SchemaExecutor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use kv_core::{HistoryRecord, MigrationId};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Retries for statements that hit a write-write conflict with another
/// connection.
const CONFLICT_RETRIES: u32 = 5;
const CONFLICT_BACKOFF: Duration = Duration::from_millis(20);

/// Lease currently held by this backend.
#[derive(Debug, Clone)]
struct HeldLease {
    key: String,
    lease: Duration,
}

/// DuckDB migration backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
    tables: HistoryTables,
    holder: String,
    held: Mutex<Option<HeldLease>>,
}

impl DuckDbBackend {
    fn from_connection(conn: Connection, tables: HistoryTables) -> Self {
        Self {
            conn: Mutex::new(conn),
            tables,
            holder: new_holder_id(),
            held: Mutex::new(None),
        }
    }

    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn, HistoryTables::default()))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_connection(conn, HistoryTables::default()))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Open `path` (or `:memory:`), waiting while another process holds the
    /// database file.
    ///
    /// Gives up with [`DbError::LockTimeout`] after `options.timeout`.
    pub async fn open_waiting(path: &str, options: &LockOptions) -> DbResult<Self> {
        if path == ":memory:" {
            return Self::in_memory();
        }

        let path = Path::new(path);
        let file_lock = LockOptions {
            key: path.display().to_string(),
            ..options.clone()
        };
        let conn = poll_until(&file_lock, "Database file", || async move {
            match Connection::open(path) {
                Ok(conn) => Ok(Some(conn)),
                Err(e) if is_file_locked(&e) => {
                    log::debug!("{} is locked by another process: {}", path.display(), e);
                    Ok(None)
                }
                Err(e) => Err(DbError::ConnectionError(format!("{}: {}", path.display(), e))),
            }
        })
        .await?;
        Ok(Self::from_connection(conn, HistoryTables::default()))
    }

    /// Use non-default history and lock table names.
    pub fn with_tables(mut self, tables: HistoryTables) -> Self {
        self.tables = tables;
        self
    }

    /// Open a second connection to the same database.
    ///
    /// The clone is an independent lock holder, which is how tests stand in
    /// for a second process against an in-memory database.
    pub fn try_clone(&self) -> DbResult<Self> {
        let conn = self
            .conn()?
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn, self.tables.clone()))
    }

    pub fn tables(&self) -> &HistoryTables {
        &self.tables
    }

    /// Identity written into the lease row while this backend holds the lock.
    pub fn holder_id(&self) -> &str {
        &self.holder
    }

    /// Check if a table or view exists in the main schema
    pub async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'main' AND table_name = ?",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn held(&self) -> DbResult<MutexGuard<'_, Option<HeldLease>>> {
        self.held
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Run `op` with the connection locked, keeping the driver error intact
    /// so callers can tell conflicts apart.
    fn with_conn<T>(
        &self,
        op: impl FnOnce(&Connection) -> duckdb::Result<T>,
    ) -> DbResult<duckdb::Result<T>> {
        let conn = self.conn()?;
        Ok(op(&conn))
    }

    /// Run `op`, retrying a few times when it hits a write-write conflict.
    async fn retry_conflicts<T>(
        &self,
        what: &str,
        op: impl Fn(&Connection) -> duckdb::Result<T> + Send + Sync,
    ) -> DbResult<T> {
        let mut attempt = 0;
        loop {
            match self.with_conn(&op)? {
                Ok(value) => return Ok(value),
                Err(e) if is_conflict(&e) && attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    log::debug!("{} hit a write conflict, retry {}: {}", what, attempt, e);
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(CONFLICT_BACKOFF).await;
        }
    }

    fn try_acquire_sync(&self, key: &str, lease: Duration) -> DbResult<bool> {
        let now = now_millis();
        let expires_at = now.saturating_add(duration_millis(lease));
        let seed = format!(
            "INSERT INTO {} (lock_key, holder, expires_at) VALUES (?, NULL, 0) ON CONFLICT DO NOTHING",
            self.tables.lock()
        );
        let claim = format!(
            "UPDATE {} SET holder = ?, expires_at = ? \
             WHERE lock_key = ? AND (holder IS NULL OR holder = ? OR expires_at < ?)",
            self.tables.lock()
        );

        let result = self.with_conn(|conn| {
            conn.execute(&seed, params![key])?;
            conn.execute(&claim, params![self.holder, expires_at, key, self.holder, now])
        })?;

        match result {
            Ok(updated) => Ok(updated == 1),
            Err(e) if is_conflict(&e) => {
                log::debug!("Lock claim for '{}' conflicted with another holder: {}", key, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HistoryStore for DuckDbBackend {
    async fn ensure_schema(&self) -> DbResult<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {history} (
                migration_id BIGINT PRIMARY KEY,
                name VARCHAR NOT NULL,
                checksum VARCHAR NOT NULL,
                applied_at BIGINT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {lock} (
                lock_key VARCHAR PRIMARY KEY,
                holder VARCHAR,
                expires_at BIGINT NOT NULL DEFAULT 0
            );",
            history = self.tables.history(),
            lock = self.tables.lock(),
        );
        self.retry_conflicts("ensure_schema", |conn| conn.execute_batch(&ddl))
            .await?;
        log::debug!(
            "History table '{}' and lock table '{}' ready",
            self.tables.history(),
            self.tables.lock()
        );
        Ok(())
    }

    async fn applied(&self) -> DbResult<Vec<HistoryRecord>> {
        let sql = format!(
            "SELECT migration_id, name, checksum, applied_at FROM {} ORDER BY migration_id",
            self.tables.history()
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, name, checksum, applied_at) = row?;
            records.push(HistoryRecord {
                migration_id: MigrationId::new(id),
                name,
                checksum,
                applied_at: timestamp(applied_at)?,
            });
        }
        Ok(records)
    }

    async fn record(&self, record: &HistoryRecord) -> DbResult<()> {
        let id = record.migration_id;
        let conn = self.conn()?;

        let exists: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE migration_id = ?",
                self.tables.history()
            ),
            params![id.value()],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(HistoryError::AlreadyApplied(id).into());
        }

        conn.execute(
            &format!(
                "INSERT INTO {} (migration_id, name, checksum, applied_at) VALUES (?, ?, ?, ?)",
                self.tables.history()
            ),
            params![
                id.value(),
                record.name,
                record.checksum,
                record.applied_at.timestamp()
            ],
        )?;
        Ok(())
    }

    async fn remove(&self, id: MigrationId) -> DbResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE migration_id = ?", self.tables.history()),
            params![id.value()],
        )?;
        if deleted == 0 {
            return Err(HistoryError::NotApplied(id).into());
        }
        Ok(())
    }
}

#[async_trait]
impl AdvisoryLock for DuckDbBackend {
    async fn acquire_lock(&self, options: &LockOptions) -> DbResult<()> {
        poll_acquire(options, || async {
            self.try_acquire_sync(&options.key, options.lease)
        })
        .await?;

        *self.held()? = Some(HeldLease {
            key: options.key.clone(),
            lease: options.lease,
        });
        Ok(())
    }

    async fn refresh_lock(&self) -> DbResult<()> {
        let held = self.held()?.clone();
        let Some(held) = held else {
            return Err(DbError::Internal(
                "refresh_lock called without holding the lock".to_string(),
            ));
        };

        let expires_at = now_millis().saturating_add(duration_millis(held.lease));
        let sql = format!(
            "UPDATE {} SET expires_at = ? WHERE lock_key = ? AND holder = ?",
            self.tables.lock()
        );
        let renewed = self
            .retry_conflicts("refresh_lock", |conn| {
                conn.execute(&sql, params![expires_at, held.key, self.holder])
            })
            .await?;

        if renewed == 0 {
            *self.held()? = None;
            return Err(DbError::LockLost { key: held.key });
        }
        Ok(())
    }

    async fn release_lock(&self) -> DbResult<()> {
        let held = self.held()?.take();
        let Some(held) = held else {
            return Ok(());
        };

        let sql = format!(
            "UPDATE {} SET holder = NULL, expires_at = 0 WHERE lock_key = ? AND holder = ?",
            self.tables.lock()
        );
        let released = self
            .retry_conflicts("release_lock", |conn| {
                conn.execute(&sql, params![held.key, self.holder])
            })
            .await?;

        if released == 0 {
            log::warn!(
                "Migration lock '{}' was no longer held by this run at release",
                held.key
            );
        } else {
            log::debug!("Released migration lock '{}'", held.key);
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaExecutor for DuckDbBackend {
    async fn begin(&self) -> DbResult<()> {
        self.conn()?
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN: {e}")))
    }

    async fn commit(&self) -> DbResult<()> {
        self.conn()?
            .execute_batch("COMMIT")
            .map_err(|e| DbError::TransactionError(format!("COMMIT: {e}")))
    }

    async fn rollback(&self) -> DbResult<()> {
        self.conn()?
            .execute_batch("ROLLBACK")
            .map_err(|e| DbError::TransactionError(format!("ROLLBACK: {e}")))
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }
}

impl MigrationBackend for DuckDbBackend {
    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

/// Whether a DuckDB error is a concurrency conflict with another connection.
fn is_conflict(err: &duckdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("Conflict") || msg.contains("conflict")
}

/// Whether opening failed because another process holds the file.
fn is_file_locked(err: &duckdb::Error) -> bool {
    err.to_string().contains("Could not set lock")
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn timestamp(secs: i64) -> DbResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| DbError::Internal(format!("applied_at {secs} is out of range")))
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
