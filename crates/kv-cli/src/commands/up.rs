//! Up command implementation

use anyhow::{Context, Result};
use kv_core::plan_up;

use crate::cli::{GlobalArgs, UpArgs};
use crate::commands::common::run_plan;
use crate::context::RuntimeContext;

/// Execute the up command
pub async fn execute(args: &UpArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global).await?;
    let applied = ctx.applied_ids().await?;

    let mut plan = plan_up(&ctx.registry, &applied).context("Failed to plan migrations")?;
    if let Some(count) = args.count {
        plan = plan.limit(count);
    }

    run_plan(&ctx, &plan, args.dry_run).await
}
