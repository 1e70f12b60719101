//! Remote execution and progress traits
//!
//! These traits let the engine run against any transport and any UI.
//! The engine never opens connections itself.

use crate::error::Result;
use crate::types::{HostTarget, ResourcePlan, ResourceReport, StepOutcome};
use std::path::Path;

/// Capability to act on a remote host.
///
/// Each call is one logical session; implementations are not required to
/// reuse connections between calls.
pub trait RemoteExecutor: Send + Sync {
    /// Run a shell command and return its standard output.
    ///
    /// A command that runs but exits unsuccessfully is
    /// [`Error::RemoteCommand`](crate::Error::RemoteCommand); a failure to
    /// reach the host is [`Error::RemoteConnection`](crate::Error::RemoteConnection).
    fn run_command(&self, target: &HostTarget, command: &str) -> Result<String>;

    /// Copy a local file to `remote_path` on the host
    fn upload_file(&self, target: &HostTarget, local: &Path, remote_path: &str) -> Result<()>;
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for &E {
    fn run_command(&self, target: &HostTarget, command: &str) -> Result<String> {
        (**self).run_command(target, command)
    }

    fn upload_file(&self, target: &HostTarget, local: &Path, remote_path: &str) -> Result<()> {
        (**self).upload_file(target, local, remote_path)
    }
}

/// Progress callback for deploy runs
///
/// Implement this trait to receive progress updates during execution.
/// With more than one job, step updates are delivered after each host group
/// finishes rather than live.
pub trait ProgressCallback: Send {
    /// Called once before the first resource
    fn on_start(&mut self, resources: usize);

    /// Called when a resource's plan is ready and apply begins
    fn on_resource_start(&mut self, plan: &ResourcePlan);

    /// Called after each applied step
    fn on_step(&mut self, resource: &str, outcome: &StepOutcome);

    /// Called when a resource is done, including its state update
    fn on_resource_complete(&mut self, report: &ResourceReport);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _resources: usize) {}
    fn on_resource_start(&mut self, _plan: &ResourcePlan) {}
    fn on_step(&mut self, _resource: &str, _outcome: &StepOutcome) {}
    fn on_resource_complete(&mut self, _report: &ResourceReport) {}
}
