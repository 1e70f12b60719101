//! Core types for declared resources, plans, and reports

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque secret used to authenticate against a host.
///
/// Serialized verbatim (state mirrors the declaration shape) but never
/// printed through `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for handing to a transport
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<none>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// One managed target: a host plus the files, packages, and commands for it.
///
/// The resource name is not part of the spec; it is the key the spec is
/// declared and stored under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub host: String,
    #[serde(rename = "password", default)]
    pub credential: Credential,
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    #[serde(rename = "command", default)]
    pub commands: Vec<String>,
}

impl ResourceSpec {
    /// Address and credential for remote calls
    pub fn target(&self) -> HostTarget {
        HostTarget {
            address: self.host.clone(),
            credential: self.credential.clone(),
        }
    }

    /// Commands joined into the single remote command line that gets run
    pub fn command_line(&self) -> Option<String> {
        if self.commands.is_empty() {
            None
        } else {
            Some(self.commands.join(" "))
        }
    }
}

/// A resource as read from a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredResource {
    /// Unique key of the resource
    pub name: String,
    pub spec: ResourceSpec,
    /// Directory that declared file names are resolved against
    pub source_dir: PathBuf,
}

impl DeclaredResource {
    pub fn new(name: &str, spec: ResourceSpec, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            spec,
            source_dir: source_dir.into(),
        }
    }
}

/// A file deployed to `path/name` on the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSpec {
    pub name: String,
    pub path: String,
    pub mode: String,
}

impl FileSpec {
    pub fn new(name: &str, path: &str, mode: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            mode: mode.to_string(),
        }
    }

    /// Remote identity: (path, name)
    pub fn identity(&self) -> (&str, &str) {
        (self.path.as_str(), self.name.as_str())
    }

    /// Full path of the file on the host
    pub fn remote_path(&self) -> String {
        let dir = self.path.trim_end_matches('/');
        format!("{}/{}", dir, self.name)
    }
}

/// A package and the version it should be installed at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub package: String,
    #[serde(default)]
    pub version: String,
}

impl PackageSpec {
    pub fn new(package: &str, version: &str) -> Self {
        Self {
            package: package.to_string(),
            version: version.to_string(),
        }
    }

    /// Pinned to an exact version (anything other than empty or "latest")
    pub fn is_pinned(&self) -> bool {
        !(self.version.is_empty() || self.version == "latest")
    }

    /// Version label for display
    pub fn version_label(&self) -> &str {
        if self.is_pinned() {
            &self.version
        } else {
            "latest"
        }
    }
}

/// Where a remote call goes and how it authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    pub address: String,
    pub credential: Credential,
}

/// File field that can be changed in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileField {
    Mode,
}

impl fmt::Display for FileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileField::Mode => write!(f, "mode"),
        }
    }
}

/// Operation on a deployed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOperation {
    /// Upload a file that is not deployed yet
    Create(FileSpec),
    /// Remove `previous` from the host and upload `file`
    Replace { file: FileSpec, previous: FileSpec },
    /// Change a field of the deployed file in place
    Update {
        file: FileSpec,
        field: FileField,
        value: String,
    },
    /// Remove a file that is no longer declared
    Delete(FileSpec),
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::Create(file) => write!(f, "create {}", file.remote_path()),
            FileOperation::Replace { file, previous } if file == previous => {
                write!(f, "replace {} (content changed)", file.remote_path())
            }
            FileOperation::Replace { file, previous } => write!(
                f,
                "replace {} with {}",
                previous.remote_path(),
                file.remote_path()
            ),
            FileOperation::Update { file, field, value } => write!(
                f,
                "update {} {}: {} -> {}",
                file.remote_path(),
                field,
                file.mode,
                value
            ),
            FileOperation::Delete(file) => write!(f, "delete {}", file.remote_path()),
        }
    }
}

/// Operation on an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageOperation {
    Install(PackageSpec),
    Remove(PackageSpec),
}

impl fmt::Display for PackageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOperation::Install(pkg) => {
                write!(f, "install {} ({})", pkg.package, pkg.version_label())
            }
            PackageOperation::Remove(pkg) => write!(f, "remove {}", pkg.package),
        }
    }
}

/// Where a resource stands relative to its stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// No stored entry, or the stored entry targets another host
    Unseen,
    /// Stored entry for this host and nothing to change
    Matched,
    /// Stored entry for this host and operations to apply
    Drifted,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Unseen => write!(f, "new"),
            ResourceStatus::Matched => write!(f, "in sync"),
            ResourceStatus::Drifted => write!(f, "drifted"),
        }
    }
}

/// Operations computed for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub name: String,
    pub status: ResourceStatus,
    pub files: Vec<FileOperation>,
    pub packages: Vec<PackageOperation>,
    /// Joined command line that runs after files and packages
    pub command: Option<String>,
}

impl ResourcePlan {
    /// No file or package operations (commands do not count)
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.packages.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.files.len() + self.packages.len()
    }
}

/// What an upsert did to the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    Added,
    Updated,
    Unchanged,
}

/// Outcome of one applied step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Human-readable step, e.g. "install nginx (latest)"
    pub step: String,
    /// Error message when the step failed
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn ok(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            error: None,
        }
    }

    pub fn failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of deploying one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub plan: ResourcePlan,
    pub steps: Vec<StepOutcome>,
    /// Standard output of the resource's command line
    pub command_output: Option<String>,
    pub state: StateChange,
}

impl ResourceReport {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_success()).count()
    }
}

/// Summary of a deploy run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploySummary {
    pub resources: usize,
    pub in_sync: usize,
    pub applied: usize,
    pub failed: usize,
}

impl DeploySummary {
    /// Build counters from per-resource reports
    pub fn from_reports(reports: &[ResourceReport]) -> Self {
        let mut summary = Self {
            resources: reports.len(),
            ..Default::default()
        };
        for report in reports {
            summary.in_sync += usize::from(report.plan.is_empty());
            for step in &report.steps {
                if step.is_success() {
                    summary.applied += 1;
                } else {
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// No step failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
