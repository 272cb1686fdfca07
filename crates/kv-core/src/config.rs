//! Configuration types and parsing for versioning.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file names probed in a project directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["versioning.yml", "versioning.yaml"];

const DEFAULT_DATABASE_URL: &str = "duckdb://versioning.duckdb";
const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
const DEFAULT_HISTORY_TABLE: &str = "kv_migrations";
const DEFAULT_LOCK_TABLE: &str = "kv_migrations_lock";
const DEFAULT_LOCK_KEY: &str = "kiosk_versioning";

/// Number of migrations `down` reverts when no count is given.
pub const DEFAULT_DOWN_COUNT: usize = 1;

/// Project configuration from versioning.yml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Target database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Directory holding one sub-directory per migration
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,

    /// History and lock table settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Cross-process lock timings
    #[serde(default)]
    pub lock: LockConfig,

    /// Defaults for `down`
    #[serde(default)]
    pub down: DownConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            migrations_dir: default_migrations_dir(),
            history: HistoryConfig::default(),
            lock: LockConfig::default(),
            down: DownConfig::default(),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL (`duckdb://path`, `postgres://...`) or a bare DuckDB path
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Where applied-migration state lives inside the target database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// History table name
    #[serde(default = "default_history_table")]
    pub table: String,

    /// Lease table used by backends without native advisory locks
    #[serde(default = "default_lock_table")]
    pub lock_table: String,

    /// Name the advisory lock is derived from
    #[serde(default = "default_lock_key")]
    pub lock_key: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            table: default_history_table(),
            lock_table: default_lock_table(),
            lock_key: default_lock_key(),
        }
    }
}

/// Longest accepted lock wait (one day).
pub const MAX_LOCK_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Cross-process lock timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Maximum wait for the lock before failing with a lock timeout
    #[serde(default = "default_lock_timeout_secs")]
    pub timeout_secs: u64,

    /// Lease length for lease-based locks; an expired lease may be taken over.
    ///
    /// The lease is renewed between steps, not during one, so it must be
    /// longer than the slowest single migration.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Delay between acquisition attempts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_lock_timeout_secs(),
            lease_secs: default_lease_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Defaults for `down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownConfig {
    /// Migrations reverted when `--count` is not given
    #[serde(default = "default_down_count")]
    pub default_count: usize,
}

impl Default for DownConfig {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_DOWN_COUNT,
        }
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_migrations_dir() -> String {
    DEFAULT_MIGRATIONS_DIR.to_string()
}

fn default_history_table() -> String {
    DEFAULT_HISTORY_TABLE.to_string()
}

fn default_lock_table() -> String {
    DEFAULT_LOCK_TABLE.to_string()
}

fn default_lock_key() -> String {
    DEFAULT_LOCK_KEY.to_string()
}

fn default_lock_timeout_secs() -> u64 {
    30
}

fn default_lease_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_down_count() -> usize {
    DEFAULT_DOWN_COUNT
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                path: path.display().to_string(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory.
    ///
    /// Looks for versioning.yml or versioning.yaml and falls back to the
    /// built-in defaults when neither exists.
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        match CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
        {
            Some(path) => Self::load(&path),
            None => {
                log::debug!("No config file in {}, using defaults", dir.display());
                Ok(Self::default())
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "database.url cannot be empty".to_string(),
            });
        }
        if self.migrations_dir.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "migrations_dir cannot be empty".to_string(),
            });
        }

        for (field, value) in [
            ("history.table", &self.history.table),
            ("history.lock_table", &self.history.lock_table),
        ] {
            if !is_plain_identifier(value) {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "{field} '{value}' must be a plain SQL identifier ([A-Za-z_][A-Za-z0-9_]*)"
                    ),
                });
            }
        }
        if self.history.table == self.history.lock_table {
            return Err(CoreError::ConfigInvalid {
                message: "history.table and history.lock_table must differ".to_string(),
            });
        }
        if self.history.lock_key.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "history.lock_key cannot be empty".to_string(),
            });
        }

        if self.lock.poll_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "lock.poll_interval_ms must be greater than 0".to_string(),
            });
        }
        if self.lock.lease_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "lock.lease_secs must be greater than 0".to_string(),
            });
        }
        if self.lock.timeout_secs > MAX_LOCK_TIMEOUT_SECS {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "lock.timeout_secs {} exceeds the maximum of {} seconds",
                    self.lock.timeout_secs, MAX_LOCK_TIMEOUT_SECS
                ),
            });
        }

        Ok(())
    }

    /// Get absolute migrations directory relative to a project root
    pub fn migrations_dir_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations_dir)
    }
}

/// Whether `s` is usable unquoted as a SQL table name.
pub fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
