//! Database URL parsing and backend construction.

use crate::duckdb::DuckDbBackend;
use crate::error::{DbError, DbResult};
use crate::lock::LockOptions;
use crate::tables::HistoryTables;
use crate::traits::MigrationBackend;
use std::path::Path;

/// A parsed database URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// DuckDB file path or `:memory:`
    DuckDb(String),
    /// Full `postgres://` connection string
    Postgres(String),
    /// Recognised but unsupported
    MySql(String),
}

impl DatabaseUrl {
    /// Parse `duckdb://path`, `postgres://...`, `postgresql://...`,
    /// `mysql://...`, or a bare DuckDB file path.
    pub fn parse(url: &str) -> DbResult<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DbError::InvalidUrl(url.to_string()));
        }

        if let Some(path) = url.strip_prefix("duckdb://") {
            if path.is_empty() {
                return Err(DbError::InvalidUrl(url.to_string()));
            }
            return Ok(DatabaseUrl::DuckDb(path.to_string()));
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(DatabaseUrl::Postgres(url.to_string()));
        }
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            return Ok(DatabaseUrl::MySql(url.to_string()));
        }
        if url.contains("://") {
            return Err(DbError::InvalidUrl(url.to_string()));
        }
        Ok(DatabaseUrl::DuckDb(url.to_string()))
    }

    /// Resolve a relative DuckDB path against `root`.
    pub fn relative_to(self, root: &Path) -> Self {
        match self {
            DatabaseUrl::DuckDb(path) if path != ":memory:" && Path::new(&path).is_relative() => {
                DatabaseUrl::DuckDb(root.join(path).display().to_string())
            }
            other => other,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            DatabaseUrl::DuckDb(_) => "duckdb",
            DatabaseUrl::Postgres(_) => "postgres",
            DatabaseUrl::MySql(_) => "mysql",
        }
    }
}

/// Open a backend for `url`.
///
/// A DuckDB file held by another process is waited for, bounded by
/// `lock.timeout`, the same way the migration lock is.
pub async fn connect(
    url: &DatabaseUrl,
    tables: HistoryTables,
    lock: &LockOptions,
) -> DbResult<Box<dyn MigrationBackend>> {
    log::debug!("Connecting to {} database", url.backend_name());
    match url {
        DatabaseUrl::DuckDb(path) => Ok(Box::new(
            DuckDbBackend::open_waiting(path, lock)
                .await?
                .with_tables(tables),
        )),
        DatabaseUrl::Postgres(conn_str) => connect_postgres(conn_str, tables).await,
        DatabaseUrl::MySql(_) => Err(DbError::NotImplemented {
            backend: "mysql".to_string(),
            feature: "migrations (DDL commits implicitly, so a step cannot be atomic)".to_string(),
        }),
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(
    conn_str: &str,
    tables: HistoryTables,
) -> DbResult<Box<dyn MigrationBackend>> {
    let backend = crate::postgres::PostgresBackend::connect(conn_str, tables).await?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(
    _conn_str: &str,
    _tables: HistoryTables,
) -> DbResult<Box<dyn MigrationBackend>> {
    Err(DbError::NotImplemented {
        backend: "postgres".to_string(),
        feature: "this build (rebuild with the `postgres` feature)".to_string(),
    })
}
