//! Generate command implementation

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use kv_core::source::{DOWN_FILE, UP_FILE};
use kv_core::{DirectorySource, MigrationId, MigrationName, Registry};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{GenerateArgs, GlobalArgs};
use crate::context::{load_config, project_root};

/// Paths written for a new migration.
#[derive(Debug)]
pub(crate) struct GeneratedMigration {
    pub id: MigrationId,
    pub dir: PathBuf,
    pub up: PathBuf,
    pub down: PathBuf,
}

/// Execute the generate command
pub async fn execute(args: &GenerateArgs, global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let migrations_dir = config.migrations_dir_absolute(&project_root(global));

    let created = generate_migration(&migrations_dir, &args.name, Utc::now())?;
    println!("Created migration {} in {}", created.id, created.dir.display());
    println!("  {}", created.up.display());
    println!("  {}", created.down.display());
    println!("Delete {} if the migration cannot be reverted.", DOWN_FILE);
    Ok(())
}

/// Create `<dir>/m<id>_<name>/` with skeleton up and down scripts.
///
/// The id sorts after every existing migration in `dir`.
pub(crate) fn generate_migration(
    dir: &Path,
    raw_name: &str,
    now: DateTime<Utc>,
) -> Result<GeneratedMigration> {
    let name = MigrationName::parse_generated(raw_name)?;

    let registry = if dir.exists() {
        Registry::load(&DirectorySource::new(dir))
            .with_context(|| format!("Failed to load migrations from {}", dir.display()))?
    } else {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        log::info!("Created migrations directory {}", dir.display());
        Registry::default()
    };

    if let Some(existing) = registry.iter().find(|m| m.name().as_str() == name.as_str()) {
        bail!("A migration named '{}' already exists ({})", name, existing.stem());
    }

    let id = registry.next_id(now);
    let target = dir.join(format!("m{}_{}", id.stem_prefix(), name));
    if target.exists() {
        bail!("Migration directory already exists: {}", target.display());
    }
    fs::create_dir(&target).with_context(|| format!("Failed to create {}", target.display()))?;

    let up = target.join(UP_FILE);
    let down = target.join(DOWN_FILE);
    let created_at = now.format("%Y-%m-%d %H:%M:%S UTC");
    fs::write(
        &up,
        format!("-- Migration: {name}\n-- Created: {created_at}\n\n"),
    )
    .with_context(|| format!("Failed to write {}", up.display()))?;
    fs::write(
        &down,
        format!("-- Revert: {name}\n-- Created: {created_at}\n\n"),
    )
    .with_context(|| format!("Failed to write {}", down.display()))?;

    Ok(GeneratedMigration {
        id,
        dir: target,
        up,
        down,
    })
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
