//! Status command implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use kv_core::{HistoryRecord, Registry};
use serde::Serialize;
use std::collections::HashMap;

use crate::cli::{GlobalArgs, StatusArgs};
use crate::commands::common::print_table;
use crate::context::RuntimeContext;

/// Where a migration stands relative to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MigrationState {
    Applied,
    Pending,
    /// In history but no longer in the registry
    Orphaned,
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationState::Applied => write!(f, "applied"),
            MigrationState::Pending => write!(f, "pending"),
            MigrationState::Orphaned => write!(f, "orphaned"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusRow {
    pub id: i64,
    pub name: String,
    pub state: MigrationState,
    pub reversible: Option<bool>,
    pub applied_at: Option<DateTime<Utc>>,
    /// The up script changed since it was applied
    pub modified: bool,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let records = ctx
        .backend
        .applied()
        .await
        .context("Failed to read migration history")?;
    let rows = build_status(&ctx.registry, &records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No migrations found.");
        return Ok(());
    }

    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let state = if r.modified {
                format!("{} (modified)", r.state)
            } else {
                r.state.to_string()
            };
            vec![
                r.id.to_string(),
                r.name.clone(),
                state,
                r.applied_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "STATE", "APPLIED AT"], &table);

    let count = |state: MigrationState| rows.iter().filter(|r| r.state == state).count();
    println!();
    println!(
        "{} applied, {} pending",
        count(MigrationState::Applied),
        count(MigrationState::Pending)
    );
    let orphaned = count(MigrationState::Orphaned);
    if orphaned > 0 {
        log::warn!(
            "{} applied migration(s) are missing from the migrations directory; up and down will refuse to run",
            orphaned
        );
    }
    let modified = rows.iter().filter(|r| r.modified).count();
    if modified > 0 {
        log::warn!(
            "{} applied migration(s) were edited after being applied",
            modified
        );
    }
    Ok(())
}

/// One row per registry migration in id order, then orphaned history rows.
pub(crate) fn build_status(registry: &Registry, records: &[HistoryRecord]) -> Vec<StatusRow> {
    let by_id: HashMap<_, _> = records.iter().map(|r| (r.migration_id, r)).collect();

    let mut rows: Vec<StatusRow> = registry
        .iter()
        .map(|m| match by_id.get(&m.id()) {
            Some(record) => StatusRow {
                id: m.id().value(),
                name: m.name().to_string(),
                state: MigrationState::Applied,
                reversible: Some(m.is_reversible()),
                applied_at: Some(record.applied_at),
                modified: record.checksum != m.checksum(),
            },
            None => StatusRow {
                id: m.id().value(),
                name: m.name().to_string(),
                state: MigrationState::Pending,
                reversible: Some(m.is_reversible()),
                applied_at: None,
                modified: false,
            },
        })
        .collect();

    rows.extend(
        records
            .iter()
            .filter(|r| !registry.contains(r.migration_id))
            .map(|r| StatusRow {
                id: r.migration_id.value(),
                name: r.name.clone(),
                state: MigrationState::Orphaned,
                reversible: None,
                applied_at: Some(r.applied_at),
                modified: false,
            }),
    );
    rows
}
