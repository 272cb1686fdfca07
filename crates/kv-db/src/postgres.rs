//! Postgres migration backend (feature `postgres`)
//!
//! Postgres DDL is transactional and the server has native advisory locks.
//! The lock is session scoped, so a crashed process releases it when its
//! connection drops.

use crate::error::{DbError, DbResult, HistoryError};
use crate::lock::{advisory_key, poll_acquire, LockOptions};
use crate::tables::HistoryTables;
use crate::traits::{AdvisoryLock, HistoryStore, MigrationBackend, SchemaExecutor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kv_core::{HistoryRecord, MigrationId};
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor, Row};
use tokio::sync::Mutex;

/// Postgres migration backend over a single session.
pub struct PostgresBackend {
    conn: Mutex<PgConnection>,
    tables: HistoryTables,
    held: std::sync::Mutex<Option<(String, i64)>>,
}

impl PostgresBackend {
    pub async fn connect(url: &str, tables: HistoryTables) -> DbResult<Self> {
        let conn = PgConnection::connect(url)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            tables,
            held: std::sync::Mutex::new(None),
        })
    }

    fn held(&self) -> DbResult<std::sync::MutexGuard<'_, Option<(String, i64)>>> {
        self.held
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    async fn simple(&self, sql: &str) -> DbResult<()> {
        let mut conn = self.conn.lock().await;
        (&mut *conn).execute(sql).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PostgresBackend {
    async fn ensure_schema(&self) -> DbResult<()> {
        // Concurrent CREATE TABLE IF NOT EXISTS can still race on the catalog
        let guard_key = advisory_key(self.tables.history());
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                migration_id BIGINT PRIMARY KEY,
                name VARCHAR NOT NULL,
                checksum VARCHAR NOT NULL,
                applied_at BIGINT NOT NULL
            )",
            self.tables.history()
        );

        let mut conn = self.conn.lock().await;
        let mut tx = conn.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(guard_key)
            .execute(&mut *tx)
            .await?;
        (&mut *tx).execute(ddl.as_str()).await?;
        tx.commit().await?;
        log::debug!("History table '{}' ready", self.tables.history());
        Ok(())
    }

    async fn applied(&self) -> DbResult<Vec<HistoryRecord>> {
        let sql = format!(
            "SELECT migration_id, name, checksum, applied_at FROM {} ORDER BY migration_id",
            self.tables.history()
        );
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let applied_at: i64 = row.try_get("applied_at")?;
            records.push(HistoryRecord {
                migration_id: MigrationId::new(row.try_get("migration_id")?),
                name: row.try_get("name")?,
                checksum: row.try_get("checksum")?,
                applied_at: DateTime::<Utc>::from_timestamp(applied_at, 0).ok_or_else(|| {
                    DbError::Internal(format!("applied_at {applied_at} is out of range"))
                })?,
            });
        }
        Ok(records)
    }

    async fn record(&self, record: &HistoryRecord) -> DbResult<()> {
        let id = record.migration_id;
        let mut conn = self.conn.lock().await;
        let inserted = sqlx::query(&format!(
            "INSERT INTO {} (migration_id, name, checksum, applied_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (migration_id) DO NOTHING",
            self.tables.history()
        ))
        .bind(id.value())
        .bind(&record.name)
        .bind(&record.checksum)
        .bind(record.applied_at.timestamp())
        .execute(&mut *conn)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(HistoryError::AlreadyApplied(id).into());
        }
        Ok(())
    }

    async fn remove(&self, id: MigrationId) -> DbResult<()> {
        let mut conn = self.conn.lock().await;
        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE migration_id = $1",
            self.tables.history()
        ))
        .bind(id.value())
        .execute(&mut *conn)
        .await?;

        if deleted.rows_affected() == 0 {
            return Err(HistoryError::NotApplied(id).into());
        }
        Ok(())
    }
}

#[async_trait]
impl AdvisoryLock for PostgresBackend {
    async fn acquire_lock(&self, options: &LockOptions) -> DbResult<()> {
        let key = advisory_key(&options.key);
        poll_acquire(options, || async move {
            let mut conn = self.conn.lock().await;
            let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
                .bind(key)
                .fetch_one(&mut *conn)
                .await?;
            Ok(acquired)
        })
        .await?;

        *self.held()? = Some((options.key.clone(), key));
        Ok(())
    }

    async fn refresh_lock(&self) -> DbResult<()> {
        let held = self.held()?.clone();
        let Some((name, key)) = held else {
            return Err(DbError::Internal(
                "refresh_lock called without holding the lock".to_string(),
            ));
        };

        let mut conn = self.conn.lock().await;
        let still_held: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_locks \
             WHERE locktype = 'advisory' AND pid = pg_backend_pid() AND granted \
             AND ((classid::bigint << 32) | objid::bigint) = $1)",
        )
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;

        if !still_held {
            return Err(DbError::LockLost { key: name });
        }
        Ok(())
    }

    async fn release_lock(&self) -> DbResult<()> {
        let held = self.held()?.take();
        let Some((name, key)) = held else {
            return Ok(());
        };

        let mut conn = self.conn.lock().await;
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;
        if released {
            log::debug!("Released migration lock '{}'", name);
        } else {
            log::warn!("Migration lock '{}' was not held at release", name);
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaExecutor for PostgresBackend {
    async fn begin(&self) -> DbResult<()> {
        self.simple("BEGIN")
            .await
            .map_err(|e| DbError::TransactionError(format!("BEGIN: {e}")))
    }

    async fn commit(&self) -> DbResult<()> {
        self.simple("COMMIT")
            .await
            .map_err(|e| DbError::TransactionError(format!("COMMIT: {e}")))
    }

    async fn rollback(&self) -> DbResult<()> {
        self.simple("ROLLBACK")
            .await
            .map_err(|e| DbError::TransactionError(format!("ROLLBACK: {e}")))
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.simple(sql).await
    }
}

impl MigrationBackend for PostgresBackend {
    fn db_type(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
