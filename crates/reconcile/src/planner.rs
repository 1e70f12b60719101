//! Plan computation for one declared resource

use crate::diff::Differ;
use crate::types::{
    FileOperation, PackageOperation, ResourcePlan, ResourceSpec, ResourceStatus,
};

/// A stored entry only counts as this resource's baseline if it targets the
/// same host.
pub fn is_unseen(spec: &ResourceSpec, stored: Option<&ResourceSpec>) -> bool {
    stored.is_none_or(|s| s.host != spec.host)
}

/// Everything declared, as if the host had never been touched
pub fn fresh_plan(name: &str, spec: &ResourceSpec) -> ResourcePlan {
    ResourcePlan {
        name: name.to_string(),
        status: ResourceStatus::Unseen,
        files: spec.files.iter().cloned().map(FileOperation::Create).collect(),
        packages: spec
            .packages
            .iter()
            .cloned()
            .map(PackageOperation::Install)
            .collect(),
        command: spec.command_line(),
    }
}

/// Plan for `spec` against its stored baseline.
///
/// Unseen resources get every file and package unconditionally, without
/// touching the host. Known resources are diffed against the stored spec and
/// the live host.
pub fn plan(
    differ: &Differ<'_>,
    name: &str,
    spec: &ResourceSpec,
    stored: Option<&ResourceSpec>,
) -> ResourcePlan {
    let stored = match stored {
        Some(stored) if !is_unseen(spec, Some(stored)) => stored,
        _ => {
            log::info!("Resource {name} is not in state for host {}", spec.host);
            return fresh_plan(name, spec);
        }
    };

    let target = spec.target();
    let files = differ.files(&target, &spec.files, &stored.files);
    let packages = differ.packages(&target, &spec.packages, Some(stored));

    let status = if files.is_empty() && packages.is_empty() {
        ResourceStatus::Matched
    } else {
        ResourceStatus::Drifted
    };

    ResourcePlan {
        name: name.to_string(),
        status,
        files,
        packages,
        command: spec.command_line(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use crate::types::{FileSpec, PackageSpec};

    fn spec(host: &str) -> ResourceSpec {
        ResourceSpec {
            host: host.into(),
            files: vec![FileSpec::new("index.html", "/var/www", "644")],
            packages: vec![PackageSpec::new("nginx", "")],
            commands: vec!["nginx".into(), "-s".into(), "reload".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_unseen_when_missing_or_host_changed() {
        assert!(is_unseen(&spec("a"), None));
        assert!(is_unseen(&spec("a"), Some(&spec("b"))));
        assert!(!is_unseen(&spec("a"), Some(&spec("a"))));
    }

    #[test]
    fn test_unseen_plan_does_not_touch_host() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        let differ = Differ::new(&host, dir.path());

        let plan = plan(&differ, "web1", &spec("a"), Some(&spec("b")));
        assert_eq!(plan.status, ResourceStatus::Unseen);
        assert_eq!(plan.files.len(), 1);
        assert!(matches!(plan.files[0], FileOperation::Create(_)));
        assert_eq!(
            plan.packages,
            [PackageOperation::Install(PackageSpec::new("nginx", ""))]
        );
        assert_eq!(plan.command.as_deref(), Some("nginx -s reload"));

        let first_run = super::plan(&differ, "web1", &spec("a"), None);
        assert_eq!(first_run, plan);
        assert!(host.commands().is_empty());
    }

    #[test]
    fn test_known_resource_is_diffed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<h1>hi</h1>").unwrap();
        let host = FakeHost::new();
        host.put_file("/var/www/index.html", b"<h1>hi</h1>");
        host.put_package("nginx", "1.18.0");
        let differ = Differ::new(&host, dir.path());

        let matched = plan(&differ, "web1", &spec("a"), Some(&spec("a")));
        assert_eq!(matched.status, ResourceStatus::Matched);
        assert!(matched.is_empty());

        let mut desired = spec("a");
        desired.files[0].mode = "600".into();
        let drifted = plan(&differ, "web1", &desired, Some(&spec("a")));
        assert_eq!(drifted.status, ResourceStatus::Drifted);
        assert_eq!(drifted.operation_count(), 1);
    }
}
