//! Command implementations for the convoy CLI

pub mod deploy;
pub mod propose;
pub mod state;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result, bail};
use reconcile::{DeclaredResource, StateStore};
use std::path::Path;

use crate::Context;
use crate::loader;

/// Load declarations under `dir`, failing when there are none
pub fn load_declarations(ctx: &Context, dir: &Path) -> Result<Vec<DeclaredResource>> {
    let resources = loader::load_resources(dir, ctx.settings.declaration_depth)
        .with_context(|| format!("Failed to load declarations from {}", dir.display()))?;
    if resources.is_empty() {
        bail!(
            "No {} found in {}",
            loader::DECLARATION_FILES.join(" or "),
            dir.display()
        );
    }
    Ok(resources)
}

/// State store at the configured location
pub fn open_store(ctx: &Context) -> StateStore {
    let path = ctx.settings.state_path();
    log::debug!("Using state file {}", path.display());
    StateStore::at_path(path)
}
