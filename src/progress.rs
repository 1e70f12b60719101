//! Deploy progress bar for the convoy CLI.

use crate::ui;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ProgressCallback, ResourcePlan, ResourceReport, StepOutcome};

/// Progress bar over resources, with one printed line per applied step.
///
/// Step lines are printed even when the bar itself is hidden.
pub struct DeployProgress {
    bar: ProgressBar,
}

impl DeployProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for DeployProgress {
    fn on_start(&mut self, resources: usize) {
        self.bar.set_length(resources as u64);
    }

    fn on_resource_start(&mut self, plan: &ResourcePlan) {
        self.bar
            .set_message(format!("{} ({})", plan.name, plan.status));
    }

    fn on_step(&mut self, resource: &str, outcome: &StepOutcome) {
        let line = ui::step_line(resource, outcome);
        self.bar.suspend(|| println!("{line}"));
    }

    fn on_resource_complete(&mut self, report: &ResourceReport) {
        if report.plan.is_empty() {
            self.bar
                .suspend(|| ui::dim(&format!("{} is in sync", report.plan.name)));
        }
        self.bar.inc(1);
    }
}
