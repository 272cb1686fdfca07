//! Migration executor: runs a plan step by step under the advisory lock.
//!
//! Each step is one transaction holding both the schema change and its
//! history bookkeeping, so a step is either fully applied and recorded or
//! leaves no trace. Steps committed before a failure stay committed.

use crate::error::{DbError, DbResult};
use crate::lock::LockOptions;
use crate::report::{ExecutionReport, SkipReason, StepOutcome, StepReport};
use crate::traits::MigrationBackend;
use chrono::Utc;
use kv_core::{Direction, HistoryRecord, MigrationDescriptor, MigrationId, MigrationPlan};
use std::collections::BTreeSet;
use std::time::Instant;

/// Runs migration plans against one backend.
pub struct Executor<'a, B: MigrationBackend + ?Sized> {
    backend: &'a B,
    lock: LockOptions,
}

impl<'a, B: MigrationBackend + ?Sized> Executor<'a, B> {
    pub fn new(backend: &'a B, lock: LockOptions) -> Self {
        Self { backend, lock }
    }

    /// Execute `plan` in its direction.
    ///
    /// An empty plan returns an empty report without taking the lock.
    /// Otherwise the lock is held for the whole run and released on every
    /// path. A failed step halts the run and is reported in the returned
    /// report rather than as `Err`; use [`ExecutionReport::into_result`] to
    /// turn it into an error. Losing the lock or failing to read history
    /// before a step halts the same way, with that step marked failed.
    pub async fn execute(&self, plan: &MigrationPlan<'_>) -> DbResult<ExecutionReport> {
        let mut report = ExecutionReport::new(plan.direction());
        if plan.is_empty() {
            log::info!("No migrations to run {}", plan.direction());
            return Ok(report);
        }

        log::debug!(
            "Acquiring migration lock '{}' on {}",
            self.lock.key,
            self.backend.db_type()
        );
        self.backend.acquire_lock(&self.lock).await?;

        self.run_steps(plan, &mut report).await;

        if let Err(release_err) = self.backend.release_lock().await {
            log::error!("Failed to release migration lock: {}", release_err);
            if report.is_success() {
                return Err(release_err);
            }
        }
        Ok(report)
    }

    async fn run_steps(&self, plan: &MigrationPlan<'_>, report: &mut ExecutionReport) {
        let direction = plan.direction();
        let total = plan.len();

        for (index, step) in plan.steps().iter().enumerate() {
            // Another run may have changed history between planning and now
            let applied = match self.recheck().await {
                Ok(applied) => applied,
                Err(e) => {
                    log::error!("Run halted before {}: {}", step, e);
                    report.push(StepReport {
                        id: step.id(),
                        name: step.name().to_string(),
                        outcome: StepOutcome::Failed(e.to_string()),
                        elapsed: std::time::Duration::ZERO,
                    });
                    report.not_attempted = total - index - 1;
                    break;
                }
            };
            let already_done = match direction {
                Direction::Up => applied.contains(&step.id()),
                Direction::Down => !applied.contains(&step.id()),
            };
            if already_done {
                log::info!(
                    "Skipping {}: it was {} by a concurrent run",
                    step,
                    completed_verb(direction)
                );
                report.push(StepReport {
                    id: step.id(),
                    name: step.name().to_string(),
                    outcome: StepOutcome::Skipped(SkipReason::ConcurrentModification),
                    elapsed: std::time::Duration::ZERO,
                });
                continue;
            }

            log::debug!(
                "{} [{}/{}]: pending -> {}",
                step,
                index + 1,
                total,
                active_verb(direction)
            );
            let started = Instant::now();
            let result = self.run_step(step, direction).await;
            let elapsed = started.elapsed();

            match result {
                Ok(()) => {
                    let outcome = match direction {
                        Direction::Up => StepOutcome::Applied,
                        Direction::Down => StepOutcome::Reverted,
                    };
                    log::debug!("{}: {} -> {}", step, active_verb(direction), outcome);
                    log::info!("{} {} in {:?}", outcome, step, elapsed);
                    if elapsed >= self.lock.lease {
                        log::warn!(
                            "{} ran for {:?}, longer than the {:?} lock lease; \
                             raise lock.lease_secs above the slowest migration",
                            step,
                            elapsed,
                            self.lock.lease
                        );
                    }
                    report.push(StepReport {
                        id: step.id(),
                        name: step.name().to_string(),
                        outcome,
                        elapsed,
                    });
                }
                Err(e) => {
                    log::debug!("{}: {} -> failed", step, active_verb(direction));
                    log::error!("Migration {} failed: {}", step, e);
                    report.push(StepReport {
                        id: step.id(),
                        name: step.name().to_string(),
                        outcome: StepOutcome::Failed(e.to_string()),
                        elapsed,
                    });
                    report.not_attempted = total - index - 1;
                    break;
                }
            }
        }
    }

    /// Confirm the lock is still ours and read the current applied set.
    async fn recheck(&self) -> DbResult<BTreeSet<MigrationId>> {
        self.backend.refresh_lock().await?;
        self.backend.applied_ids().await
    }

    /// One step in one transaction, rolled back on any error.
    async fn run_step(&self, step: &MigrationDescriptor, direction: Direction) -> DbResult<()> {
        let script = step.action().script(direction).ok_or_else(|| {
            DbError::Internal(format!("{step} has no {direction} action"))
        })?;

        self.backend.begin().await?;
        let result = self.apply_in_transaction(step, direction, script).await;
        if result.is_err() {
            if let Err(rollback_err) = self.backend.rollback().await {
                log::warn!("Rollback of {} failed: {}", step, rollback_err);
            }
        }
        result
    }

    async fn apply_in_transaction(
        &self,
        step: &MigrationDescriptor,
        direction: Direction,
        script: &str,
    ) -> DbResult<()> {
        self.backend.execute_batch(script).await?;
        match direction {
            Direction::Up => {
                let record = HistoryRecord::for_descriptor(step, Utc::now());
                self.backend.record(&record).await?;
            }
            Direction::Down => self.backend.remove(step.id()).await?,
        }
        self.backend.commit().await
    }
}

fn active_verb(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "applying",
        Direction::Down => "reverting",
    }
}

fn completed_verb(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "applied",
        Direction::Down => "reverted",
    }
}
