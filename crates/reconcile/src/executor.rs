//! Orchestration - plans and applies declared resources against their hosts

use crate::context::{ProgressCallback, RemoteExecutor};
use crate::diff::Differ;
use crate::error::{Error, Result};
use crate::planner;
use crate::shell;
use crate::state::StateStore;
use crate::types::{
    DeclaredResource, FileOperation, FileSpec, HostTarget, PackageOperation, ResourcePlan, ResourceReport,
    StepOutcome,
};
use crate::validate;
use rayon::prelude::*;

/// Options for a deploy run
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Number of host groups deployed at once
    pub jobs: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// Drives propose and deploy over a batch of declared resources
pub struct Orchestrator<'a> {
    store: &'a StateStore,
    executor: &'a dyn RemoteExecutor,
}

impl<'a> Orchestrator<'a> {
    pub fn new(store: &'a StateStore, executor: &'a dyn RemoteExecutor) -> Self {
        Self { store, executor }
    }

    /// Compute the plan for every resource without changing anything.
    ///
    /// Fails before touching any host when a resource is rejected or the
    /// state cannot be read.
    pub fn propose(&self, resources: &[DeclaredResource]) -> Result<Vec<ResourcePlan>> {
        validate::ensure_valid(resources)?;
        let stored = self.store.load()?;

        let plans: Vec<ResourcePlan> = resources
            .iter()
            .map(|resource| {
                let previous = stored
                    .iter()
                    .find(|(name, _)| *name == resource.name)
                    .map(|(_, spec)| spec);
                let differ = Differ::new(self.executor, &resource.source_dir);
                planner::plan(&differ, &resource.name, &resource.spec, previous)
            })
            .collect();

        if plans.iter().all(ResourcePlan::is_empty) {
            log::info!("No changes to apply");
        }
        Ok(plans)
    }

    /// Converge every resource and record what was applied.
    ///
    /// Remote failures are recorded in the reports and do not stop the run.
    /// Validation, unreadable state, and failed state writes do.
    pub fn deploy<P: ProgressCallback>(
        &self,
        resources: &[DeclaredResource],
        opts: &DeployOptions,
        progress: &mut P,
    ) -> Result<Vec<ResourceReport>> {
        validate::ensure_valid(resources)?;
        self.store.init()?;
        self.store.load()?;

        progress.on_start(resources.len());

        if opts.jobs <= 1 || resources.len() <= 1 {
            let mut reports = Vec::with_capacity(resources.len());
            for resource in resources {
                reports.push(self.deploy_one(resource, progress)?);
            }
            Ok(reports)
        } else {
            self.deploy_parallel(resources, opts.jobs, progress)
        }
    }

    /// Deploy host groups on a bounded pool.
    ///
    /// Progress can't be shared across workers, so each group records its
    /// events and they are replayed in declaration order afterwards.
    fn deploy_parallel<P: ProgressCallback>(
        &self,
        resources: &[DeclaredResource],
        jobs: usize,
        progress: &mut P,
    ) -> Result<Vec<ResourceReport>> {
        let groups = group_by_host(resources);
        log::debug!(
            "Deploying {} resources in {} host groups with {} jobs",
            resources.len(),
            groups.len(),
            jobs
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let outcomes: Vec<Result<Vec<(usize, ResourceReport, Recorder)>>> = pool.install(|| {
            groups
                .par_iter()
                .map(|indices| -> Result<Vec<(usize, ResourceReport, Recorder)>> {
                    let mut done = Vec::with_capacity(indices.len());
                    for &idx in indices {
                        let mut recorder = Recorder::default();
                        let report = self.deploy_one(&resources[idx], &mut recorder)?;
                        done.push((idx, report, recorder));
                    }
                    Ok(done)
                })
                .collect()
        });

        let mut slots: Vec<Option<(ResourceReport, Recorder)>> =
            resources.iter().map(|_| None).collect();
        for outcome in outcomes {
            for (idx, report, recorder) in outcome? {
                slots[idx] = Some((report, recorder));
            }
        }

        let mut reports = Vec::with_capacity(resources.len());
        for (report, recorder) in slots.into_iter().flatten() {
            recorder.replay(progress);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Plan, apply, and record a single resource
    fn deploy_one(
        &self,
        resource: &DeclaredResource,
        progress: &mut dyn ProgressCallback,
    ) -> Result<ResourceReport> {
        let name = resource.name.as_str();
        let spec = &resource.spec;
        log::info!("Applying configuration for {name}");

        let stored = self.store.get_one(name)?;
        let differ = Differ::new(self.executor, &resource.source_dir);
        let plan = planner::plan(&differ, name, spec, stored.as_ref());
        progress.on_resource_start(&plan);

        let target = spec.target();
        let mut steps = Vec::with_capacity(plan.operation_count() + 1);

        if plan.files.is_empty() {
            log::info!("All files are up to date");
        }
        for op in &plan.files {
            let outcome = record(op.to_string(), self.apply_file(&differ, &target, op));
            progress.on_step(name, &outcome);
            steps.push(outcome);
        }

        if plan.packages.is_empty() {
            log::info!("All packages are up to date");
        }
        for op in &plan.packages {
            let outcome = record(op.to_string(), self.apply_package(&target, op));
            progress.on_step(name, &outcome);
            steps.push(outcome);
        }

        let mut command_output = None;
        if let Some(command) = &plan.command {
            log::info!("Running command on {}: {command}", target.address);
            let result = self.executor.run_command(&target, command).map(|stdout| {
                log::debug!("Command output: {}", stdout.trim_end());
                command_output = Some(stdout);
            });
            let outcome = record(format!("run {command}"), result);
            progress.on_step(name, &outcome);
            steps.push(outcome);
        }

        let state = self.store.upsert(name, spec)?;
        let report = ResourceReport {
            plan,
            steps,
            command_output,
            state,
        };
        progress.on_resource_complete(&report);
        Ok(report)
    }

    fn apply_file(&self, differ: &Differ<'_>, target: &HostTarget, op: &FileOperation) -> Result<()> {
        match op {
            FileOperation::Create(file) => {
                self.upload(differ, target, file)?;
                self.run(target, &shell::set_mode(&file.mode, &file.remote_path()))
            }
            FileOperation::Replace { file, previous } => {
                self.run(target, &shell::remove_file(&previous.remote_path()))?;
                self.upload(differ, target, file)?;
                self.run(target, &shell::set_mode(&file.mode, &file.remote_path()))
            }
            FileOperation::Update { file, value, .. } => {
                self.run(target, &shell::set_mode(value, &file.remote_path()))
            }
            FileOperation::Delete(file) => {
                self.run(target, &shell::remove_file(&file.remote_path()))
            }
        }
    }

    fn apply_package(&self, target: &HostTarget, op: &PackageOperation) -> Result<()> {
        let command = match op {
            PackageOperation::Install(pkg) => shell::install_package(pkg),
            PackageOperation::Remove(pkg) => shell::remove_package(pkg),
        };
        self.run(target, &command)
    }

    fn upload(
        &self,
        differ: &Differ<'_>,
        target: &HostTarget,
        file: &FileSpec,
    ) -> Result<()> {
        let local = differ.source_of(file);
        let remote = file.remote_path();
        log::info!("Uploading {} to {}:{remote}", local.display(), target.address);
        self.executor.upload_file(target, &local, &remote)
    }

    fn run(&self, target: &HostTarget, command: &str) -> Result<()> {
        log::info!("Running on {}: {command}", target.address);
        self.executor.run_command(target, command).map(|_| ())
    }
}

/// Turn an operation result into a report step, logging failures
fn record(step: String, result: Result<()>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::ok(step),
        Err(e) => {
            log::error!("Failed to {step}: {e}");
            StepOutcome::failed(step, e.to_string())
        }
    }
}

/// Indices of `resources` grouped by host, in first-seen order
fn group_by_host(resources: &[DeclaredResource]) -> Vec<Vec<usize>> {
    let mut hosts: Vec<&str> = Vec::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (idx, resource) in resources.iter().enumerate() {
        let host = resource.spec.host.as_str();
        match hosts.iter().position(|h| *h == host) {
            Some(group) => groups[group].push(idx),
            None => {
                hosts.push(host);
                groups.push(vec![idx]);
            }
        }
    }
    groups
}

enum Event {
    Start(ResourcePlan),
    Step(String, StepOutcome),
    Complete(ResourceReport),
}

/// Progress events captured on a worker thread
#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
}

impl Recorder {
    fn replay<P: ProgressCallback + ?Sized>(self, progress: &mut P) {
        for event in self.events {
            match event {
                Event::Start(plan) => progress.on_resource_start(&plan),
                Event::Step(resource, outcome) => progress.on_step(&resource, &outcome),
                Event::Complete(report) => progress.on_resource_complete(&report),
            }
        }
    }
}

impl ProgressCallback for Recorder {
    fn on_start(&mut self, _resources: usize) {}

    fn on_resource_start(&mut self, plan: &ResourcePlan) {
        self.events.push(Event::Start(plan.clone()));
    }

    fn on_step(&mut self, resource: &str, outcome: &StepOutcome) {
        self.events
            .push(Event::Step(resource.to_string(), outcome.clone()));
    }

    fn on_resource_complete(&mut self, report: &ResourceReport) {
        self.events.push(Event::Complete(report.clone()));
    }
}
