//! Refresh command implementation: revert everything, then apply everything.

use anyhow::{Context, Result};
use kv_core::{plan_down, plan_up};
use std::collections::BTreeSet;

use crate::cli::{GlobalArgs, RefreshArgs};
use crate::commands::common::run_plan;
use crate::context::RuntimeContext;

/// Execute the refresh command
///
/// Planning the revert checks every applied migration up front, so an
/// irreversible one fails the command before anything is touched.
pub async fn execute(args: &RefreshArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let applied = ctx.applied_ids().await?;

    let down =
        plan_down(&ctx.registry, &applied, applied.len()).context("Failed to plan revert")?;

    if args.dry_run {
        run_plan(&ctx, &down, true).await?;
        let up = plan_up(&ctx.registry, &BTreeSet::new()).context("Failed to plan migrations")?;
        return run_plan(&ctx, &up, true).await;
    }

    run_plan(&ctx, &down, false).await?;

    let applied = ctx.applied_ids().await?;
    let up = plan_up(&ctx.registry, &applied).context("Failed to plan migrations")?;
    run_plan(&ctx, &up, false).await
}
