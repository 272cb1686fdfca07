//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use kv_core::{Direction, MigrationPlan};
use kv_db::{ExecutionReport, Executor};
use std::time::Duration;

use crate::context::RuntimeContext;

/// Print the plan, then execute it unless `dry_run`.
///
/// A halted run becomes an error naming the failed migration and the
/// driver message.
pub(crate) async fn run_plan(
    ctx: &RuntimeContext,
    plan: &MigrationPlan<'_>,
    dry_run: bool,
) -> Result<()> {
    if plan.is_empty() {
        match plan.direction() {
            Direction::Up => println!("Database is up to date; no pending migrations."),
            Direction::Down => println!("No applied migrations to revert."),
        }
        return Ok(());
    }

    print_plan(plan, dry_run);
    if dry_run {
        return Ok(());
    }

    let report = Executor::new(ctx.backend.as_ref(), ctx.lock.clone())
        .execute(plan)
        .await
        .context("Migration run aborted")?;
    print_report(&report);
    report.into_result()?;
    Ok(())
}

fn print_plan(plan: &MigrationPlan<'_>, dry_run: bool) {
    let verb = match plan.direction() {
        Direction::Up => "apply",
        Direction::Down => "revert",
    };
    if dry_run {
        println!("Dry run - would {} {} migration(s):", verb, plan.len());
    } else {
        println!("Planning to {} {} migration(s):", verb, plan.len());
    }
    for step in plan.steps() {
        println!("  {}", step.stem());
    }
}

fn print_report(report: &ExecutionReport) {
    let rows: Vec<Vec<String>> = report
        .steps
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.name.clone(),
                s.outcome.to_string(),
                format_elapsed(s.elapsed),
            ]
        })
        .collect();
    println!();
    print_table(&["ID", "NAME", "RESULT", "TIME"], &rows);

    println!();
    let mut summary = format!(
        "{} {}, {} skipped",
        report.completed(),
        match report.direction {
            Direction::Up => "applied",
            Direction::Down => "reverted",
        },
        report.skipped()
    );
    if !report.is_success() {
        summary.push_str(&format!(", 1 failed, {} not attempted", report.not_attempted));
    }
    println!("{summary}");
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Calculate column widths for table output.
fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }
    widths
}

/// Print a table with column alignment.
///
/// ```text
/// ID              NAME                          STATE
/// --------------  ----------------------------  -------
/// 20250711090750  create_kiosk_versions_table   applied
/// ```
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  ").trim_end());

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  ").trim_end());
    }
}
