//! Ordered, validated collection of every known migration.

use crate::error::RegistryError;
use crate::migration::{MigrationDescriptor, MigrationId};
use crate::source::MigrationSource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// All known migrations, sorted by id.
///
/// Invariant: ids strictly increase and no two descriptors share an id or a
/// name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    migrations: Vec<MigrationDescriptor>,
}

impl Registry {
    /// Discover descriptors from `source`, then sort and validate them.
    pub fn load(source: &dyn MigrationSource) -> Result<Self, RegistryError> {
        let registry = Self::from_descriptors(source.discover()?)?;
        log::debug!("Loaded {} migration(s)", registry.len());
        Ok(registry)
    }

    /// Build a registry from an arbitrary list of descriptors.
    ///
    /// Enumeration order of the input does not matter; the result is always
    /// ordered by id.
    pub fn from_descriptors(
        mut migrations: Vec<MigrationDescriptor>,
    ) -> Result<Self, RegistryError> {
        migrations.sort_by_key(|m| m.id());

        for pair in migrations.windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(RegistryError::DuplicateId {
                    id: pair[0].id(),
                    first: pair[0].name().to_string(),
                    second: pair[1].name().to_string(),
                });
            }
        }

        let mut seen: HashMap<&str, MigrationId> = HashMap::with_capacity(migrations.len());
        for m in &migrations {
            if let Some(first) = seen.insert(m.name().as_str(), m.id()) {
                return Err(RegistryError::DuplicateName {
                    name: m.name().to_string(),
                    first,
                    second: m.id(),
                });
            }
        }

        Ok(Self { migrations })
    }

    /// Descriptors in ascending id order.
    pub fn migrations(&self) -> &[MigrationDescriptor] {
        &self.migrations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MigrationDescriptor> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: MigrationId) -> Option<&MigrationDescriptor> {
        self.migrations
            .binary_search_by_key(&id, |m| m.id())
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    pub fn contains(&self, id: MigrationId) -> bool {
        self.get(id).is_some()
    }

    /// Highest registered id.
    pub fn last_id(&self) -> Option<MigrationId> {
        self.migrations.last().map(|m| m.id())
    }

    /// Ordering key for a newly generated migration at `now`.
    ///
    /// Uses the timestamp id of `now` unless that would not sort strictly
    /// after the current last id, in which case it is `last + 1`.
    pub fn next_id(&self, now: DateTime<Utc>) -> MigrationId {
        let candidate = MigrationId::from_timestamp(now);
        match self.last_id() {
            Some(last) if candidate <= last => last.next(),
            _ => candidate,
        }
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a MigrationDescriptor;
    type IntoIter = std::slice::Iter<'a, MigrationDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.iter()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
