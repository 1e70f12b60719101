//! Diff computation for files and packages
//!
//! File diffs are keyed on remote identity (path, name), so reordering a
//! declaration is not a change. Identity changes that line up one-to-one
//! become replacements; whatever is left over is deleted or created.

use crate::context::RemoteExecutor;
use crate::error::{Error, Result};
use crate::shell::{self, PackageStatus};
use crate::types::{FileField, FileOperation, FileSpec, HostTarget, PackageOperation, PackageSpec, ResourceSpec};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io;
use std::path::Path;

/// Operations implied by the declared file metadata alone.
///
/// Pure: no file contents are looked at.
pub fn structural_file_diff(desired: &[FileSpec], stored: &[FileSpec]) -> Vec<FileOperation> {
    let mut stored_by_id: HashMap<(&str, &str), &FileSpec> = HashMap::new();
    for file in stored {
        stored_by_id.entry(file.identity()).or_insert(file);
    }
    let desired_ids: HashSet<(&str, &str)> = desired.iter().map(FileSpec::identity).collect();

    let unmatched_stored: Vec<&FileSpec> = stored
        .iter()
        .filter(|f| !desired_ids.contains(&f.identity()))
        .collect();
    let unmatched_desired: Vec<&FileSpec> = desired
        .iter()
        .filter(|f| !stored_by_id.contains_key(&f.identity()))
        .collect();
    let pairs = unmatched_stored.len().min(unmatched_desired.len());

    let mut ops = Vec::new();
    let mut next_unmatched = 0;
    for file in desired {
        match stored_by_id.get(&file.identity()) {
            Some(previous) => {
                if previous.mode != file.mode {
                    ops.push(FileOperation::Update {
                        file: (*previous).clone(),
                        field: FileField::Mode,
                        value: file.mode.clone(),
                    });
                }
            }
            None => {
                if next_unmatched < pairs {
                    ops.push(FileOperation::Replace {
                        file: file.clone(),
                        previous: unmatched_stored[next_unmatched].clone(),
                    });
                }
                next_unmatched += 1;
            }
        }
    }

    for previous in &unmatched_stored[pairs..] {
        ops.push(FileOperation::Delete((*previous).clone()));
    }
    for file in &unmatched_desired[pairs..] {
        ops.push(FileOperation::Create((*file).clone()));
    }
    ops
}

/// SHA-256 of a local file as lowercase hex
pub fn local_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Ask the host's package database about one package.
///
/// dpkg-query exits non-zero for packages it has never seen, which counts as
/// not installed. Transport failures are returned as errors.
pub fn query_package(
    executor: &dyn RemoteExecutor,
    target: &HostTarget,
    package: &str,
) -> Result<PackageStatus> {
    match executor.run_command(target, &shell::package_query(package)) {
        Ok(stdout) => Ok(shell::parse_package_query(&stdout)),
        Err(Error::RemoteCommand { .. }) => Ok(PackageStatus::NotInstalled),
        Err(e) => Err(e),
    }
}

/// Computes plans for one resource against live host condition
pub struct Differ<'a> {
    executor: &'a dyn RemoteExecutor,
    source_dir: &'a Path,
}

impl<'a> Differ<'a> {
    /// `source_dir` is where local copies of declared files live
    pub fn new(executor: &'a dyn RemoteExecutor, source_dir: &'a Path) -> Self {
        Self {
            executor,
            source_dir,
        }
    }

    /// Local source for a declared file
    pub fn source_of(&self, file: &FileSpec) -> std::path::PathBuf {
        self.source_dir.join(&file.name)
    }

    /// File operations: metadata first, then content when metadata agrees
    pub fn files(
        &self,
        target: &HostTarget,
        desired: &[FileSpec],
        stored: &[FileSpec],
    ) -> Vec<FileOperation> {
        let ops = structural_file_diff(desired, stored);
        if !ops.is_empty() {
            return ops;
        }
        self.content_changes(target, desired)
    }

    fn content_changes(&self, target: &HostTarget, files: &[FileSpec]) -> Vec<FileOperation> {
        let mut ops = Vec::new();
        for file in files {
            let remote_path = file.remote_path();
            let local = self.source_of(file);

            let local_hash = match local_digest(&local) {
                Ok(digest) => Some(digest),
                Err(e) => {
                    log::error!("Error hashing local file {}: {}", local.display(), e);
                    None
                }
            };
            let remote_hash = match self
                .executor
                .run_command(target, &shell::checksum(&remote_path))
            {
                Ok(stdout) => shell::parse_checksum(&stdout),
                Err(e @ Error::RemoteCommand { .. }) => {
                    log::info!("File {remote_path} is missing on {}: {e}", target.address);
                    None
                }
                Err(e) => {
                    log::error!("Error getting checksum of {remote_path}: {e}");
                    None
                }
            };

            match (local_hash, remote_hash) {
                (Some(local), Some(remote)) if local == remote => {
                    log::info!("File {remote_path} unchanged");
                }
                _ => {
                    log::info!("File {remote_path} will be replaced as its contents changed");
                    ops.push(FileOperation::Replace {
                        file: file.clone(),
                        previous: file.clone(),
                    });
                }
            }
        }
        ops
    }

    /// Package operations, one remote query per declared package.
    ///
    /// Packages dropped from the declaration are reported but never removed.
    pub fn packages(
        &self,
        target: &HostTarget,
        desired: &[PackageSpec],
        stored: Option<&ResourceSpec>,
    ) -> Vec<PackageOperation> {
        if let Some(stored) = stored {
            for old in &stored.packages {
                if !desired.iter().any(|p| p.package == old.package) {
                    log::warn!(
                        "Package {} is no longer declared; it stays installed on {}",
                        old.package,
                        target.address
                    );
                }
            }
        }

        let mut ops = Vec::new();
        for pkg in desired {
            log::info!("Determining state of package {} on host...", pkg.package);
            let status = match query_package(self.executor, target, &pkg.package) {
                Ok(status) => status,
                Err(e) => {
                    log::error!("Error querying package {}: {}", pkg.package, e);
                    continue;
                }
            };

            match status {
                PackageStatus::NotInstalled => {
                    log::info!(
                        "Package {} is not installed and will be installed using {} version",
                        pkg.package,
                        pkg.version_label()
                    );
                    ops.push(PackageOperation::Install(pkg.clone()));
                }
                PackageStatus::Installed { version } if pkg.is_pinned() && version != pkg.version => {
                    log::info!(
                        "Package {} is installed at version {} and will be changed to {}",
                        pkg.package,
                        version,
                        pkg.version
                    );
                    ops.push(PackageOperation::Install(pkg.clone()));
                }
                PackageStatus::Installed { version } => {
                    log::info!("Package {} is installed at version {}", pkg.package, version);
                }
            }
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use std::fs;

    fn target() -> HostTarget {
        HostTarget {
            address: "10.0.0.5".into(),
            credential: Default::default(),
        }
    }

    #[test]
    fn test_mode_change_is_single_update() {
        let stored = [FileSpec::new("a.conf", "/etc", "644")];
        let desired = [FileSpec::new("a.conf", "/etc", "600")];
        let ops = structural_file_diff(&desired, &stored);
        assert_eq!(
            ops,
            [FileOperation::Update {
                file: stored[0].clone(),
                field: FileField::Mode,
                value: "600".into(),
            }]
        );
    }

    #[test]
    fn test_rename_is_single_replace() {
        let stored = [FileSpec::new("a.conf", "/etc", "644")];
        let desired = [FileSpec::new("b.conf", "/etc", "644")];
        let ops = structural_file_diff(&desired, &stored);
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0],
            FileOperation::Replace {
                file: desired[0].clone(),
                previous: stored[0].clone(),
            }
        );
    }

    #[test]
    fn test_path_change_is_replace() {
        let stored = [FileSpec::new("a.conf", "/etc", "644")];
        let desired = [FileSpec::new("a.conf", "/etc/app", "644")];
        let ops = structural_file_diff(&desired, &stored);
        assert!(matches!(ops.as_slice(), [FileOperation::Replace { file, .. }] if file.path == "/etc/app"));
    }

    #[test]
    fn test_reordering_is_not_a_change() {
        let stored = [
            FileSpec::new("a.conf", "/etc", "644"),
            FileSpec::new("b.conf", "/etc", "600"),
        ];
        let desired = [stored[1].clone(), stored[0].clone()];
        assert!(structural_file_diff(&desired, &stored).is_empty());
    }

    #[test]
    fn test_grow_and_shrink() {
        let a = FileSpec::new("a.conf", "/etc", "644");
        let b = FileSpec::new("b.conf", "/etc", "644");

        let ops = structural_file_diff(&[a.clone(), b.clone()], &[a.clone()]);
        assert_eq!(ops, [FileOperation::Create(b.clone())]);

        let ops = structural_file_diff(&[a.clone()], &[a.clone(), b.clone()]);
        assert_eq!(ops, [FileOperation::Delete(b.clone())]);

        let ops = structural_file_diff(&[a.clone(), b.clone()], &[]);
        assert_eq!(ops, [FileOperation::Create(a), FileOperation::Create(b)]);
    }

    #[test]
    fn test_unpaired_leftovers_delete_then_create() {
        let keep = FileSpec::new("keep.conf", "/etc", "644");
        let old1 = FileSpec::new("old1", "/etc", "644");
        let old2 = FileSpec::new("old2", "/etc", "644");
        let new1 = FileSpec::new("new1", "/etc", "644");

        let ops = structural_file_diff(
            &[keep.clone(), new1.clone()],
            &[old1.clone(), keep, old2.clone()],
        );
        assert_eq!(
            ops,
            [
                FileOperation::Replace {
                    file: new1,
                    previous: old1,
                },
                FileOperation::Delete(old2),
            ]
        );
    }

    #[test]
    fn test_local_digest_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello\n").unwrap();
        assert_eq!(
            local_digest(&path).unwrap(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn test_content_check_runs_only_without_structural_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.conf"), b"listen 80;\n").unwrap();
        let host = FakeHost::new();
        let differ = Differ::new(&host, dir.path());

        let a = FileSpec::new("a.conf", "/etc", "644");
        let ops = differ.files(&target(), &[FileSpec::new("a.conf", "/etc", "600")], &[a.clone()]);
        assert_eq!(ops.len(), 1);
        assert!(host.commands().is_empty());

        // Nothing deployed yet: checksum fails and the file is replaced
        let ops = differ.files(&target(), &[a.clone()], &[a.clone()]);
        assert_eq!(
            ops,
            [FileOperation::Replace {
                file: a.clone(),
                previous: a.clone(),
            }]
        );

        host.put_file("/etc/a.conf", b"listen 80;\n");
        assert!(differ.files(&target(), &[a.clone()], &[a.clone()]).is_empty());

        host.put_file("/etc/a.conf", b"listen 8080;\n");
        assert_eq!(differ.files(&target(), &[a.clone()], &[a]).len(), 1);
    }

    #[test]
    fn test_missing_local_source_is_replace() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        host.put_file("/etc/a.conf", b"x");
        let differ = Differ::new(&host, dir.path());
        let a = FileSpec::new("a.conf", "/etc", "644");
        assert_eq!(differ.files(&target(), &[a.clone()], &[a]).len(), 1);
    }

    #[test]
    fn test_new_install_for_missing_package() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        let differ = Differ::new(&host, dir.path());
        let nginx = PackageSpec::new("nginx", "");

        let ops = differ.packages(&target(), &[nginx.clone()], None);
        assert_eq!(ops, [PackageOperation::Install(nginx)]);
    }

    #[test]
    fn test_installed_packages() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        host.put_package("nginx", "1.18.0-6");
        host.put_package("curl", "7.81.0");
        let differ = Differ::new(&host, dir.path());

        let unpinned = PackageSpec::new("nginx", "");
        let matched = PackageSpec::new("nginx", "1.18.0-6");
        let mismatched = PackageSpec::new("curl", "8.0.0");

        assert!(differ.packages(&target(), &[unpinned], None).is_empty());
        assert!(differ.packages(&target(), &[matched.clone()], None).is_empty());

        // A matched pin must not hide later packages
        let ops = differ.packages(&target(), &[matched, mismatched.clone()], None);
        assert_eq!(ops, [PackageOperation::Install(mismatched)]);
    }

    #[test]
    fn test_dropped_packages_are_never_removed() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        host.put_package("nginx", "1.18.0-6");
        let differ = Differ::new(&host, dir.path());
        let stored = ResourceSpec {
            host: "10.0.0.5".into(),
            packages: vec![PackageSpec::new("nginx", ""), PackageSpec::new("redis", "")],
            ..Default::default()
        };

        let ops = differ.packages(&target(), &[PackageSpec::new("nginx", "")], Some(&stored));
        assert!(ops.is_empty());
    }

    #[test]
    fn test_unreachable_host_skips_package() {
        let dir = tempfile::tempdir().unwrap();
        let host = FakeHost::unreachable();
        let differ = Differ::new(&host, dir.path());
        let ops = differ.packages(&target(), &[PackageSpec::new("nginx", "")], None);
        assert!(ops.is_empty());
    }
}
