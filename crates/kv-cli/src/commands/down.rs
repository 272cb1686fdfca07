//! Down command implementation

use anyhow::{Context, Result};
use kv_core::plan_down;

use crate::cli::{DownArgs, GlobalArgs};
use crate::commands::common::run_plan;
use crate::context::RuntimeContext;

/// Execute the down command
pub async fn execute(args: &DownArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let applied = ctx.applied_ids().await?;

    let count = if args.all {
        applied.len()
    } else {
        args.count.unwrap_or(ctx.config.down.default_count)
    };
    let plan = plan_down(&ctx.registry, &applied, count).context("Failed to plan revert")?;

    run_plan(&ctx, &plan, args.dry_run).await
}
