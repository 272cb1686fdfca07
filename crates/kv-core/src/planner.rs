//! Migration planning: diff the registry against the applied set.
//!
//! Planning is pure. It never touches the database and fails before any
//! mutation when the registry and history disagree structurally.

use crate::error::PlannerError;
use crate::migration::{Direction, MigrationDescriptor, MigrationId};
use crate::registry::Registry;
use std::collections::BTreeSet;

/// Ordered list of migrations to run in one direction.
///
/// Created fresh per invocation and never persisted.
#[derive(Debug, Clone)]
pub struct MigrationPlan<'r> {
    direction: Direction,
    steps: Vec<&'r MigrationDescriptor>,
}

impl<'r> MigrationPlan<'r> {
    fn new(direction: Direction, steps: Vec<&'r MigrationDescriptor>) -> Self {
        Self { direction, steps }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn steps(&self) -> &[&'r MigrationDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn ids(&self) -> Vec<MigrationId> {
        self.steps.iter().map(|m| m.id()).collect()
    }

    /// Keep only the first `count` steps.
    ///
    /// Used by `up --count N`; down plans take their count at planning time
    /// so the reversibility check covers exactly the selected steps.
    pub fn limit(mut self, count: usize) -> Self {
        self.steps.truncate(count);
        self
    }
}

/// Fail if history references a migration the registry no longer has.
fn check_orphans(registry: &Registry, applied: &BTreeSet<MigrationId>) -> Result<(), PlannerError> {
    match applied.iter().find(|id| !registry.contains(**id)) {
        Some(orphan) => Err(PlannerError::OrphanedHistory(*orphan)),
        None => Ok(()),
    }
}

/// Registry members not yet applied, in ascending id order.
pub fn plan_up<'r>(
    registry: &'r Registry,
    applied: &BTreeSet<MigrationId>,
) -> Result<MigrationPlan<'r>, PlannerError> {
    check_orphans(registry, applied)?;

    let steps: Vec<&MigrationDescriptor> = registry
        .iter()
        .filter(|m| !applied.contains(&m.id()))
        .collect();

    if let (Some(first_pending), Some(last_applied)) = (steps.first(), applied.last()) {
        if first_pending.id() < *last_applied {
            log::warn!(
                "Migration {} sorts before already-applied migration {}; it will be applied out of order",
                first_pending,
                last_applied
            );
        }
    }

    Ok(MigrationPlan::new(Direction::Up, steps))
}

/// The `count` most recently applied migrations, newest first.
///
/// Every selected migration must be reversible; otherwise planning fails
/// with [`PlannerError::Irreversible`] and nothing is reverted.
pub fn plan_down<'r>(
    registry: &'r Registry,
    applied: &BTreeSet<MigrationId>,
    count: usize,
) -> Result<MigrationPlan<'r>, PlannerError> {
    check_orphans(registry, applied)?;

    let mut steps = Vec::with_capacity(count.min(applied.len()));
    for id in applied.iter().rev().take(count) {
        let descriptor = registry
            .get(*id)
            .ok_or(PlannerError::OrphanedHistory(*id))?;
        if !descriptor.is_reversible() {
            return Err(PlannerError::Irreversible(*id));
        }
        steps.push(descriptor);
    }

    Ok(MigrationPlan::new(Direction::Down, steps))
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
