//! Names of the bookkeeping tables a backend manages.

use crate::error::{DbError, DbResult};
use kv_core::config::is_plain_identifier;
use kv_core::HistoryConfig;

/// History and lock table names, validated as plain SQL identifiers.
///
/// The names are interpolated into SQL, so construction rejects anything
/// that is not `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTables {
    history: String,
    lock: String,
}

impl HistoryTables {
    pub fn new(history: impl Into<String>, lock: impl Into<String>) -> DbResult<Self> {
        let history = history.into();
        let lock = lock.into();
        for name in [&history, &lock] {
            if !is_plain_identifier(name) {
                return Err(DbError::InvalidIdentifier(name.clone()));
            }
        }
        Ok(Self { history, lock })
    }

    pub fn from_config(config: &HistoryConfig) -> DbResult<Self> {
        Self::new(config.table.as_str(), config.lock_table.as_str())
    }

    pub fn history(&self) -> &str {
        &self.history
    }

    pub fn lock(&self) -> &str {
        &self.lock
    }
}

impl Default for HistoryTables {
    fn default() -> Self {
        let config = HistoryConfig::default();
        Self {
            history: config.table,
            lock: config.lock_table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tables = HistoryTables::default();
        assert_eq!(tables.history(), "kv_migrations");
        assert_eq!(tables.lock(), "kv_migrations_lock");
    }

    #[test]
    fn test_rejects_injection() {
        let err = HistoryTables::new("kv; DROP TABLE x", "lock").unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }
}
