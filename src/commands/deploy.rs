use anyhow::Result;
use std::path::Path;

use crate::Context;
use crate::progress::DeployProgress;
use crate::remote::SshExecutor;
use crate::ui;
use reconcile::{DeployOptions, DeploySummary, Orchestrator};

/// Apply every declared resource and record the result in state
pub fn run(ctx: &Context, dir: &Path) -> Result<()> {
    let resources = super::load_declarations(ctx, dir)?;
    let store = super::open_store(ctx);
    let executor = SshExecutor::new(&ctx.settings.ssh);
    let orchestrator = Orchestrator::new(&store, &executor);

    ui::header(&format!("Deploying {} resources", resources.len()));
    let opts = DeployOptions {
        jobs: ctx.settings.jobs,
    };
    let mut progress = DeployProgress::new(ctx.quiet);
    let result = orchestrator.deploy(&resources, &opts, &mut progress);
    progress.finish();
    let reports = result?;

    if ctx.verbose > 0 {
        for report in &reports {
            if let Some(output) = report.command_output.as_deref().map(str::trim_end) {
                if !output.is_empty() {
                    ui::section(&format!("{} command output", report.plan.name));
                    println!("{output}");
                }
            }
        }
    }

    let summary = DeploySummary::from_reports(&reports);
    ui::print_summary(&summary);
    if !summary.is_success() {
        ui::warn("Some steps failed; run with -v for details");
    }
    Ok(())
}
