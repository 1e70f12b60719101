use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;

use crate::Context;
use crate::cli::StateCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List => list(ctx),
        StateCommand::Show { name } => show(ctx, &name),
        StateCommand::Forget { name } => forget(ctx, &name),
    }
}

fn list(ctx: &Context) -> Result<()> {
    let store = super::open_store(ctx);
    let entries = store
        .load()
        .with_context(|| format!("Failed to read state at {}", store.location()))?;

    ui::header("Recorded resources");
    ui::kv("State", &store.location());
    if entries.is_empty() {
        ui::dim("nothing recorded yet");
        return Ok(());
    }
    println!();
    for (name, spec) in &entries {
        println!(
            "  {:<20} {:<18} {}",
            name.bold(),
            spec.host,
            format!(
                "{} files, {} packages",
                spec.files.len(),
                spec.packages.len()
            )
            .dimmed()
        );
    }
    Ok(())
}

fn show(ctx: &Context, name: &str) -> Result<()> {
    let store = super::open_store(ctx);
    let spec = store
        .get_one(name)
        .with_context(|| format!("Failed to read state at {}", store.location()))?
        .ok_or_else(|| reconcile::Error::NotFound {
            name: name.to_string(),
        })?;
    ui::print_spec(name, &spec);
    Ok(())
}

fn forget(ctx: &Context, name: &str) -> Result<()> {
    let store = super::open_store(ctx);
    store.remove(name)?;
    ui::success(&format!(
        "Forgot {name}; its host was not changed and the next deploy treats it as new"
    ));
    Ok(())
}
