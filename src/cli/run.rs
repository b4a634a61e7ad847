use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::commands::RunArgs;
use super::context::{parse_params, GlobalOptions, RunContext};
use super::output::deliver;
use crate::errors::KostyError;
use crate::pipeline::AuditExecutor;
use crate::reporting::{format_scan_console, Reporter};
use crate::services::{Operation, SERVICE_REGISTRY};

pub async fn handle_run(global: &GlobalOptions, args: RunArgs, cancel: CancellationToken) -> Result<(), KostyError> {
    // Names are checked before configuration or credentials are touched.
    let service = SERVICE_REGISTRY.get(&args.service)?;
    let operation = Operation::lookup(service.as_ref(), &args.operation)?;
    let params = parse_params(&args.params)?;

    let ctx = RunContext::build(global, &args.overrides(), cancel).await?;
    if ctx.settings.exclude.excludes_service(service.name()) {
        info!(service = service.name(), "Service is excluded by configuration");
        return Ok(());
    }
    let request = ctx.request(operation.name(), params)?;

    let executor = AuditExecutor::new(service.clone(), ctx.provider.clone(), ctx.scope.clone())
        .with_cost_calculator(Arc::clone(&ctx.calculator))
        .with_arn_exclusions(ctx.settings.exclude.arn_matcher())
        .with_progress(ctx.show_progress)
        .with_cancel_token(ctx.cancel.clone());
    let result = executor.run(&request).await?;

    let mut reporter = Reporter::for_operation(operation.name());
    reporter.add_scan_result(service.name(), operation.name(), &result);
    let view = format_scan_console(operation.name(), &result);
    deliver(&view, &reporter, ctx.settings.output, &ctx.output_dir(), &mut std::io::stdout()).await?;
    Ok(())
}
