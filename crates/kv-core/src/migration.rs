//! Migration descriptors: identity, ordering key, and up/down actions.

use crate::checksum::compute_checksum;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordering key of a migration.
///
/// Timestamp-derived ids use the `YYYYMMDDhhmmss` form; sequential ids are
/// plain counters. Either way the numeric value strictly orders the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(i64);

impl MigrationId {
    /// Wrap a raw id value.
    pub fn new(value: i64) -> Self {
        debug_assert!(value >= 0, "MigrationId must not be negative");
        Self(value)
    }

    /// Build the `YYYYMMDDhhmmss` id for a point in time.
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        let digits = at.format("%Y%m%d%H%M%S").to_string();
        // 14 ASCII digits always fit in an i64
        Self(digits.parse().unwrap_or_default())
    }

    /// Raw id value, as stored in the history table.
    pub fn value(self) -> i64 {
        self.0
    }

    /// The id immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Directory-name prefix for this id (without the leading `m`).
    ///
    /// 14-digit timestamp ids are split as `YYYYMMDD_hhmmss`; other ids print
    /// as-is.
    pub fn stem_prefix(self) -> String {
        let digits = self.0.to_string();
        if digits.len() == 14 {
            format!("{}_{}", &digits[..8], &digits[8..])
        } else {
            digits
        }
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MigrationId {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

/// Human-readable, unique migration label.
///
/// Never empty. Used for generated artifact naming (`m<id>_<name>/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MigrationName(String);

impl<'de> Deserialize<'de> for MigrationName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MigrationName::try_new(s)
            .ok_or_else(|| serde::de::Error::custom("migration name must not be empty"))
    }
}

impl fmt::Display for MigrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for MigrationName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MigrationName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl MigrationName {
    /// Wrap a label read from a migration source; `None` if empty.
    pub fn try_new(value: impl Into<String>) -> Option<Self> {
        let s = value.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate a name supplied by a user for `generate`.
    ///
    /// Accepts snake_case only: lowercase ASCII letters, digits and `_`,
    /// starting with a letter.
    pub fn parse_generated(raw: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidName {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if trimmed.contains('/') || trimmed.contains('\\') || trimmed.contains("..") {
            return Err(invalid("name must not contain '/', '\\' or '..'"));
        }
        if !trimmed.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Err(invalid("name must start with a lowercase letter"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid("use lowercase letters, digits and '_' only"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Direction a plan runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply forward
    Up,
    /// Revert
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// The schema change a migration performs.
///
/// A migration without a down action is expressed as [`Irreversible`]
/// instead of an empty or null script.
///
/// [`Irreversible`]: MigrationAction::Irreversible
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationAction {
    /// Forward and reverse SQL scripts
    Reversible { up: String, down: String },
    /// Forward script only
    Irreversible { up: String },
}

impl MigrationAction {
    /// Forward SQL script.
    pub fn up(&self) -> &str {
        match self {
            MigrationAction::Reversible { up, .. } | MigrationAction::Irreversible { up } => up,
        }
    }

    /// Reverse SQL script, if the migration supports reverting.
    pub fn down(&self) -> Option<&str> {
        match self {
            MigrationAction::Reversible { down, .. } => Some(down),
            MigrationAction::Irreversible { .. } => None,
        }
    }

    /// Script for the given direction.
    pub fn script(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Up => Some(self.up()),
            Direction::Down => self.down(),
        }
    }
}

/// Immutable record of one schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDescriptor {
    id: MigrationId,
    name: MigrationName,
    action: MigrationAction,
    checksum: String,
}

impl MigrationDescriptor {
    /// Build a descriptor; the checksum is derived from the up script.
    pub fn new(id: MigrationId, name: MigrationName, action: MigrationAction) -> Self {
        let checksum = compute_checksum(action.up());
        Self {
            id,
            name,
            action,
            checksum,
        }
    }

    /// Reversible migration from up and down scripts.
    pub fn reversible(
        id: impl Into<MigrationId>,
        name: MigrationName,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self::new(
            id.into(),
            name,
            MigrationAction::Reversible {
                up: up.into(),
                down: down.into(),
            },
        )
    }

    /// Irreversible migration from an up script.
    pub fn irreversible(id: impl Into<MigrationId>, name: MigrationName, up: impl Into<String>) -> Self {
        Self::new(id.into(), name, MigrationAction::Irreversible { up: up.into() })
    }

    pub fn id(&self) -> MigrationId {
        self.id
    }

    pub fn name(&self) -> &MigrationName {
        &self.name
    }

    pub fn action(&self) -> &MigrationAction {
        &self.action
    }

    /// SHA-256 of the up script.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn is_reversible(&self) -> bool {
        self.action.down().is_some()
    }

    /// Directory name for this migration: `m<id-prefix>_<name>`.
    pub fn stem(&self) -> String {
        format!("m{}_{}", self.id.stem_prefix(), self.name)
    }
}

impl fmt::Display for MigrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
