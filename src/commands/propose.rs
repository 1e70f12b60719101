use anyhow::Result;
use std::path::Path;

use crate::Context;
use crate::remote::SshExecutor;
use crate::ui;
use reconcile::Orchestrator;

/// Show the plan for every declared resource; nothing is changed
pub fn run(ctx: &Context, dir: &Path) -> Result<()> {
    let resources = super::load_declarations(ctx, dir)?;
    let store = super::open_store(ctx);
    let executor = SshExecutor::new(&ctx.settings.ssh);
    let orchestrator = Orchestrator::new(&store, &executor);

    ui::header("Proposed changes");
    let plans = orchestrator.propose(&resources)?;

    for (resource, plan) in resources.iter().zip(&plans) {
        if ctx.quiet {
            ui::section(&resource.name);
        } else {
            ui::print_declared(resource);
        }
        ui::print_plan(plan);
    }

    println!();
    let changes: usize = plans.iter().map(|p| p.operation_count()).sum();
    if changes == 0 {
        ui::success("No changes to apply");
    } else {
        ui::info(&format!(
            "{changes} operations across {} resources; run `convoy deploy` to apply",
            plans.iter().filter(|p| !p.is_empty()).count()
        ));
    }
    Ok(())
}
