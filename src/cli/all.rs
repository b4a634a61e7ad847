use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::commands::ScopeArgs;
use super::context::{GlobalOptions, RunContext};
use super::output::deliver;
use crate::errors::KostyError;
use crate::models::OperationParams;
use crate::pipeline::ComprehensiveScanner;
use crate::services::SERVICE_REGISTRY;

pub async fn handle_all(global: &GlobalOptions, args: ScopeArgs, cancel: CancellationToken) -> Result<(), KostyError> {
    let ctx = RunContext::build(global, &args.overrides(), cancel).await?;
    let request = ctx.request("audit", OperationParams::new())?;

    let scanner = ComprehensiveScanner::new(&SERVICE_REGISTRY, ctx.provider.clone(), ctx.scope.clone())
        .with_cost_calculator(Arc::clone(&ctx.calculator))
        .with_exclusions(ctx.settings.exclude.clone())
        .with_progress(ctx.show_progress)
        .with_cancel_token(ctx.cancel.clone());
    let reporter = scanner.run(&request).await?;

    deliver(&reporter.summary(), &reporter, ctx.settings.output, &ctx.output_dir(), &mut std::io::stdout()).await?;
    Ok(())
}
