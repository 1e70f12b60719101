use colored::{ColoredString, Colorize};
use reconcile::{
    DeclaredResource, DeploySummary, FileOperation, PackageOperation, ResourcePlan,
    ResourceSpec, ResourceStatus, StepOutcome,
};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Resources and plans
// ============================================================================

/// Print the declared content of a resource (credential never shown)
pub fn print_spec(name: &str, spec: &ResourceSpec) {
    section(name);
    kv("Host", &spec.host);
    if !spec.credential.is_empty() {
        kv("Password", "<redacted>");
    }
    for file in &spec.files {
        kv("File", &format!("{} (mode {})", file.remote_path(), file.mode));
    }
    for pkg in &spec.packages {
        kv("Package", &format!("{} ({})", pkg.package, pkg.version_label()));
    }
    if let Some(command) = spec.command_line() {
        kv("Command", &command);
    }
}

pub fn print_declared(resource: &DeclaredResource) {
    print_spec(&resource.name, &resource.spec);
}

pub fn file_symbol(op: &FileOperation) -> ColoredString {
    match op {
        FileOperation::Create(_) => "+".green(),
        FileOperation::Replace { .. } => "±".yellow(),
        FileOperation::Update { .. } => "~".yellow(),
        FileOperation::Delete(_) => "-".red(),
    }
}

pub fn package_symbol(op: &PackageOperation) -> ColoredString {
    match op {
        PackageOperation::Install(_) => "+".green(),
        PackageOperation::Remove(_) => "-".red(),
    }
}

pub fn status_label(status: ResourceStatus) -> ColoredString {
    match status {
        ResourceStatus::Unseen => status.to_string().cyan(),
        ResourceStatus::Matched => status.to_string().green(),
        ResourceStatus::Drifted => status.to_string().yellow(),
    }
}

/// Print the operations planned for one resource
pub fn print_plan(plan: &ResourcePlan) {
    println!(
        "  {} {}",
        "Plan:".dimmed(),
        status_label(plan.status)
    );
    if plan.is_empty() {
        dim("no file or package changes");
    }
    for op in &plan.files {
        println!("    {} {}", file_symbol(op), op);
    }
    for op in &plan.packages {
        println!("    {} {}", package_symbol(op), op);
    }
    if let Some(command) = &plan.command {
        println!("    {} run {}", "»".blue(), command);
    }
}

/// One line for an applied step
pub fn step_line(resource: &str, outcome: &StepOutcome) -> String {
    match &outcome.error {
        None => format!("  {} {}: {}", "✓".green(), resource, outcome.step),
        Some(error) => format!(
            "  {} {}: {} {}",
            "✗".red(),
            resource,
            outcome.step,
            format!("({error})").dimmed()
        ),
    }
}

/// Print final deploy summary
pub fn print_summary(summary: &DeploySummary) {
    println!();
    if summary.is_success() {
        println!("  {} Deploy complete!", "✓".green().bold());
    } else {
        println!("  {} Deploy finished with errors", "⚠".yellow().bold());
    }

    println!("    • {} resources processed", summary.resources);
    if summary.in_sync > 0 {
        println!("    • {} already in sync", summary.in_sync);
    }
    if summary.applied > 0 {
        println!("    • {} steps applied", summary.applied);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "steps".red());
    }
}
