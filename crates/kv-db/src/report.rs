//! Outcome of one executor run.

use crate::error::ExecutionError;
use kv_core::{Direction, MigrationId};
use std::fmt;
use std::time::Duration;

/// Why a planned step was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another run applied (or reverted) the migration after planning
    ConcurrentModification,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ConcurrentModification => write!(f, "changed by a concurrent run"),
        }
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    Reverted,
    Skipped(SkipReason),
    /// The step's transaction was rolled back; carries the driver message
    Failed(String),
}

impl StepOutcome {
    /// Whether the step changed the schema.
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Applied | StepOutcome::Reverted)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Applied => write!(f, "applied"),
            StepOutcome::Reverted => write!(f, "reverted"),
            StepOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            StepOutcome::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub id: MigrationId,
    pub name: String,
    pub outcome: StepOutcome,
    pub elapsed: Duration,
}

/// Per-step outcomes of a run, in execution order.
///
/// A run halts at the first failed step; `not_attempted` counts the planned
/// steps after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub direction: Direction,
    pub steps: Vec<StepReport>,
    pub not_attempted: usize,
}

impl ExecutionReport {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            steps: Vec::new(),
            not_attempted: 0,
        }
    }

    pub fn push(&mut self, step: StepReport) {
        self.steps.push(step);
    }

    /// Steps that changed the schema.
    pub fn completed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_completed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Skipped(_)))
            .count()
    }

    /// The step the run halted on, if any.
    pub fn failure(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    /// Convert a halted run into an error.
    pub fn into_result(self) -> Result<Self, ExecutionError> {
        let completed = self.completed();
        let error = self.failure().and_then(|step| match &step.outcome {
            StepOutcome::Failed(message) => Some(ExecutionError {
                id: step.id,
                name: step.name.clone(),
                message: message.clone(),
                completed,
            }),
            _ => None,
        });
        match error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: i64, outcome: StepOutcome) -> StepReport {
        StepReport {
            id: MigrationId::new(id),
            name: format!("m{id}"),
            outcome,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_counts() {
        let mut report = ExecutionReport::new(Direction::Up);
        report.push(step(1, StepOutcome::Applied));
        report.push(step(2, StepOutcome::Skipped(SkipReason::ConcurrentModification)));
        report.push(step(3, StepOutcome::Applied));
        assert_eq!(report.completed(), 2);
        assert_eq!(report.skipped(), 1);
        assert!(report.is_success());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_into_result_on_failure() {
        let mut report = ExecutionReport::new(Direction::Up);
        report.push(step(1, StepOutcome::Applied));
        report.push(step(2, StepOutcome::Applied));
        report.push(step(3, StepOutcome::Failed("syntax error".to_string())));
        report.not_attempted = 2;

        let err = report.into_result().unwrap_err();
        assert_eq!(err.id, MigrationId::new(3));
        assert_eq!(err.completed, 2);
        assert_eq!(
            err.to_string(),
            "[X001] Migration 3 (m3) failed after 2 completed step(s): syntax error"
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(StepOutcome::Reverted.to_string(), "reverted");
        assert_eq!(
            StepOutcome::Skipped(SkipReason::ConcurrentModification).to_string(),
            "skipped (changed by a concurrent run)"
        );
    }
}
