//! Run command

use anyhow::{Context, Result};
use smelt_core::{ErrorPolicy, Verbosity};
use smelt_stages::{run_stage, ShellEngine, StageContext};
use tracing::info;

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, verbosity: Verbosity) -> Result<()> {
    let policy = ErrorPolicy::new(args.strict, verbosity);

    let mut ctx = StageContext::new(policy)
        .with_cmdline_path(args.cmdline)
        .with_extra_dirs(args.sources);

    if let Some(path) = &args.config {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read base configuration {}", path))?;
        let base = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("failed to parse base configuration {}", path))?;
        ctx = ctx.with_base(base);
    }

    let engine = ShellEngine::new(args.work_dir);
    let result = run_stage(&ctx, &engine, &args.stage).await?;

    let failures = result.action_failures();
    if failures > 0 {
        info!(
            "Stage `{}` completed with {} failed action(s)",
            result.stage, failures
        );
    } else {
        info!("Stage `{}` completed", result.stage);
    }

    Ok(())
}
