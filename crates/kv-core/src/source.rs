//! Migration sources: where descriptors are discovered from.
//!
//! A source yields descriptors in whatever order its backing store
//! enumerates them; [`crate::registry::Registry`] sorts and validates.

use crate::error::RegistryError;
use crate::migration::{MigrationDescriptor, MigrationId, MigrationName};
use std::path::{Path, PathBuf};

/// File holding the forward script inside a migration directory.
pub const UP_FILE: &str = "up.sql";

/// File holding the reverse script; absent for irreversible migrations.
pub const DOWN_FILE: &str = "down.sql";

/// Something that can enumerate migration descriptors.
pub trait MigrationSource {
    /// Return every descriptor, in no particular order.
    fn discover(&self) -> Result<Vec<MigrationDescriptor>, RegistryError>;
}

/// Migrations stored one per sub-directory of a migrations directory.
///
/// ```text
/// migrations/
///   m20250711_090750_create_kiosk_versions_table/
///     up.sql
///     down.sql      (optional)
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_script(path: &Path) -> Result<String, RegistryError> {
        std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    fn load_entry(path: &Path, entry_name: &str) -> Result<MigrationDescriptor, RegistryError> {
        let (id, name) =
            parse_migration_dir_name(entry_name).ok_or_else(|| RegistryError::InvalidMigrationName {
                entry: entry_name.to_string(),
            })?;

        let up_path = path.join(UP_FILE);
        if !up_path.is_file() {
            return Err(RegistryError::MissingUpScript {
                entry: entry_name.to_string(),
            });
        }
        let up = Self::read_script(&up_path)?;

        let down_path = path.join(DOWN_FILE);
        let descriptor = if down_path.is_file() {
            let down = Self::read_script(&down_path)?;
            MigrationDescriptor::reversible(id, name, up, down)
        } else {
            MigrationDescriptor::irreversible(id, name, up)
        };
        Ok(descriptor)
    }
}

impl MigrationSource for DirectorySource {
    fn discover(&self) -> Result<Vec<MigrationDescriptor>, RegistryError> {
        if !self.dir.is_dir() {
            return Err(RegistryError::SourceNotFound {
                path: self.dir.display().to_string(),
            });
        }

        let io_err = |e: std::io::Error| RegistryError::Io {
            path: self.dir.display().to_string(),
            source: e,
        };

        let mut descriptors = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            let entry_name = entry.file_name().to_string_lossy().into_owned();

            if entry_name.starts_with('.') {
                continue;
            }
            if !path.is_dir() {
                log::debug!("Ignoring non-directory entry in migrations dir: {}", path.display());
                continue;
            }
            descriptors.push(Self::load_entry(&path, &entry_name)?);
        }
        Ok(descriptors)
    }
}

/// A migration compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedMigration {
    /// Ordering key
    pub id: i64,
    /// Unique label
    pub name: &'static str,
    /// Forward SQL
    pub up: &'static str,
    /// Reverse SQL; `None` marks the migration irreversible
    pub down: Option<&'static str>,
}

/// Source over a static migration table, typically built with `include_str!`.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource {
    migrations: &'static [EmbeddedMigration],
}

impl EmbeddedSource {
    pub const fn new(migrations: &'static [EmbeddedMigration]) -> Self {
        Self { migrations }
    }
}

impl MigrationSource for EmbeddedSource {
    fn discover(&self) -> Result<Vec<MigrationDescriptor>, RegistryError> {
        self.migrations
            .iter()
            .map(|m| {
                let name = MigrationName::try_new(m.name).ok_or_else(|| {
                    RegistryError::InvalidMigrationName {
                        entry: format!("{}_<empty>", m.id),
                    }
                })?;
                let id = MigrationId::new(m.id);
                Ok(match m.down {
                    Some(down) => MigrationDescriptor::reversible(id, name, m.up, down),
                    None => MigrationDescriptor::irreversible(id, name, m.up),
                })
            })
            .collect()
    }
}

/// Split a migration directory name into its id and name.
///
/// Accepts an optional leading `m`, then one or two all-digit groups forming
/// the id, then the name: `m20250711_090750_create_users` gives
/// `(20250711090750, "create_users")`, `0003_add_index` gives
/// `(3, "add_index")`.
pub fn parse_migration_dir_name(entry: &str) -> Option<(MigrationId, MigrationName)> {
    let body = entry.strip_prefix('m').unwrap_or(entry);
    let mut parts = body.split('_').peekable();

    let mut digits = String::new();
    for _ in 0..2 {
        match parts.peek() {
            Some(p) if !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) => {
                digits.push_str(p);
                parts.next();
            }
            _ => break,
        }
    }
    if digits.is_empty() {
        return None;
    }

    let name = parts.collect::<Vec<_>>().join("_");
    let id: i64 = digits.parse().ok()?;
    Some((MigrationId::new(id), MigrationName::try_new(name)?))
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
