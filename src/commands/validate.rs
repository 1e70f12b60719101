use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, dir: &Path) -> Result<()> {
    let resources = super::load_declarations(ctx, dir)?;
    ui::header("Validating declarations");

    let verdicts = reconcile::validate_all(&resources);
    for (resource, verdict) in resources.iter().zip(&verdicts) {
        if !ctx.quiet {
            ui::print_declared(resource);
        }
        let label = if verdict.passed {
            "valid".green()
        } else {
            "invalid: needs at least one file and one package".red()
        };
        println!("  {} {}", "Result:".dimmed(), label);
    }

    reconcile::ensure_valid(&resources)?;
    println!();
    ui::success(&format!("{} resources are valid", resources.len()));
    Ok(())
}
