//! kv-db - History store and migration executor for kiosk versioning
//!
//! This crate provides the backend traits (`HistoryStore`, `AdvisoryLock`,
//! `SchemaExecutor`), a DuckDB implementation, an optional Postgres
//! implementation behind the `postgres` feature, and the `Executor` that
//! applies a plan one transaction per step under the migration lock.

pub mod connect;
pub mod duckdb;
pub mod error;
pub mod executor;
pub mod lock;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod report;
pub mod tables;
pub mod traits;

pub use connect::{connect, DatabaseUrl};
pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult, ExecutionError, HistoryError};
pub use executor::Executor;
pub use lock::LockOptions;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use report::{ExecutionReport, SkipReason, StepOutcome, StepReport};
pub use tables::HistoryTables;
pub use traits::{AdvisoryLock, HistoryStore, MigrationBackend, SchemaExecutor};
