//! # Reconcile
//!
//! Engine for converging remote hosts to a declared set of files, packages,
//! and commands.
//!
//! ## Core Concepts
//!
//! - **Resource**: a named host together with the files, packages, and
//!   commands it should have
//! - **State**: the last-applied spec of every resource, persisted by
//!   [`StateStore`]
//! - **Plan**: the file and package operations that would converge a host,
//!   computed by [`Differ`]
//! - **Orchestrator**: validates a batch, then proposes or deploys it
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{DeclaredResource, DeployOptions, NoProgress, Orchestrator, StateStore};
//!
//! let store = StateStore::at_path("convoy-state.json");
//! let orchestrator = Orchestrator::new(&store, &executor);
//!
//! for plan in orchestrator.propose(&resources)? {
//!     println!("{}: {}", plan.name, plan.status);
//! }
//! let reports = orchestrator.deploy(&resources, &DeployOptions::default(), &mut NoProgress)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`RemoteExecutor`]: runs commands on and copies files to a host
//! - [`ProgressCallback`]: receives progress updates during deploy
//! - [`StateBackend`]: where the state bytes live
//!
//! The engine has no transport or UI of its own.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod shell;
pub mod state;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback, RemoteExecutor};
pub use diff::{Differ, local_digest, structural_file_diff};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{DeployOptions, Orchestrator};
pub use shell::PackageStatus;
pub use state::{FileBackend, MemoryBackend, StateBackend, StateStore};
pub use types::{
    Credential, DeclaredResource, DeploySummary, FileField, FileOperation, FileSpec, HostTarget,
    PackageOperation, PackageSpec, ResourcePlan, ResourceReport, ResourceSpec, ResourceStatus,
    StateChange, StepOutcome,
};
pub use validate::{Validation, ensure_valid, validate, validate_all};
