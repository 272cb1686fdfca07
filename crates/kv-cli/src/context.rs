//! Runtime context for CLI commands

use anyhow::{Context, Result};
use kv_core::{Config, DirectorySource, MigrationId, Registry};
use kv_db::{connect, DatabaseUrl, HistoryTables, LockOptions, MigrationBackend};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Loaded configuration, registry, and an open backend with its history
/// table in place.
pub struct RuntimeContext {
    pub config: Config,
    pub registry: Registry,
    pub backend: Box<dyn MigrationBackend>,
    pub lock: LockOptions,
}

impl RuntimeContext {
    /// Create a new runtime context from global arguments
    pub async fn new(global: &GlobalArgs) -> Result<Self> {
        let root = project_root(global);
        let config = load_config(global)?;

        let migrations_dir = config.migrations_dir_absolute(&root);
        let registry = Registry::load(&DirectorySource::new(&migrations_dir))
            .with_context(|| format!("Failed to load migrations from {}", migrations_dir.display()))?;

        let url = DatabaseUrl::parse(&config.database.url)?.relative_to(&root);
        let tables = HistoryTables::from_config(&config.history)?;
        let lock = LockOptions::from_config(&config);
        let backend = connect(&url, tables, &lock)
            .await
            .with_context(|| format!("Failed to connect to {} database", url.backend_name()))?;
        backend
            .ensure_schema()
            .await
            .context("Failed to prepare the history table")?;
        log::debug!(
            "Connected to {} with {} registered migration(s)",
            backend.db_type(),
            registry.len()
        );

        Ok(Self {
            config,
            registry,
            backend,
            lock,
        })
    }

    pub async fn applied_ids(&self) -> Result<BTreeSet<MigrationId>> {
        self.backend
            .applied_ids()
            .await
            .context("Failed to read migration history")
    }
}

pub fn project_root(global: &GlobalArgs) -> PathBuf {
    PathBuf::from(&global.project_dir)
}

/// Load the config file and apply command-line overrides.
///
/// An explicit `--config` must exist; otherwise a missing file means
/// defaults.
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = match &global.config {
        Some(path) => Config::load(Path::new(path)).context("Failed to load configuration file")?,
        None => Config::load_from_dir(&project_root(global))
            .context("Failed to load project configuration")?,
    };

    if let Some(url) = &global.database_url {
        config.database.url = url.clone();
    }
    if let Some(dir) = &global.migrations_dir {
        config.migrations_dir = dir.clone();
    }
    if let Some(secs) = global.lock_timeout {
        config.lock.timeout_secs = secs;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
