//! Rows of the history table.

use crate::migration::{MigrationDescriptor, MigrationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One applied migration, as persisted in the history table.
///
/// Presence of a record means the migration was fully and successfully
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub migration_id: MigrationId,
    pub name: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Record for `descriptor`, applied at `applied_at`.
    pub fn for_descriptor(descriptor: &MigrationDescriptor, applied_at: DateTime<Utc>) -> Self {
        Self {
            migration_id: descriptor.id(),
            name: descriptor.name().to_string(),
            checksum: descriptor.checksum().to_string(),
            applied_at,
        }
    }
}

/// Set view over history records.
pub fn applied_ids(records: &[HistoryRecord]) -> BTreeSet<MigrationId> {
    records.iter().map(|r| r.migration_id).collect()
}
