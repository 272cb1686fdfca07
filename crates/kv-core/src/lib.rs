//! kv-core - Core library for kiosk versioning schema migrations
//!
//! This crate provides migration descriptors, migration sources, the ordered
//! registry, the pure planner, and configuration parsing. Nothing here talks
//! to a database; see `kv-db` for the history store and executor.

pub mod checksum;
pub mod config;
pub mod error;
pub mod history;
pub mod migration;
pub mod planner;
pub mod registry;
pub mod source;

pub use checksum::compute_checksum;
pub use config::{Config, DownConfig, HistoryConfig, LockConfig, MAX_LOCK_TIMEOUT_SECS};
pub use error::{CoreError, CoreResult, PlannerError, RegistryError};
pub use history::{applied_ids, HistoryRecord};
pub use migration::{Direction, MigrationAction, MigrationDescriptor, MigrationId, MigrationName};
pub use planner::{plan_down, plan_up, MigrationPlan};
pub use registry::Registry;
pub use source::{DirectorySource, EmbeddedMigration, EmbeddedSource, MigrationSource};
