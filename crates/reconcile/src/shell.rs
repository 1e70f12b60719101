//! Remote command lines for Debian-family hosts
//!
//! Every argument that comes from a declaration is quoted with
//! `shell_words::quote`.

use crate::types::PackageSpec;
use shell_words::quote;

/// What the host's package database says about one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageStatus {
    NotInstalled,
    Installed { version: String },
}

/// Query status and version of a package in one round-trip.
///
/// Prints `<status>|<version>`; exits non-zero when dpkg has never heard of
/// the package.
pub fn package_query(package: &str) -> String {
    format!(
        "dpkg-query --showformat='${{Status}}|${{Version}}' --show {}",
        quote(package)
    )
}

/// Interpret the output of [`package_query`]
pub fn parse_package_query(stdout: &str) -> PackageStatus {
    let line = stdout.trim();
    let (status, version) = line.split_once('|').unwrap_or((line, ""));
    // want, error flag, state; only a fully installed state counts
    let state = status.split_whitespace().nth(2);
    if state == Some("installed") {
        PackageStatus::Installed {
            version: version.trim().to_string(),
        }
    } else {
        PackageStatus::NotInstalled
    }
}

/// Install, or reinstall at the pinned version
pub fn install_package(pkg: &PackageSpec) -> String {
    let target = if pkg.is_pinned() {
        format!("{}={}", pkg.package, pkg.version)
    } else {
        pkg.package.clone()
    };
    format!(
        "DEBIAN_FRONTEND=noninteractive apt-get update && DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
        quote(&target)
    )
}

pub fn remove_package(pkg: &PackageSpec) -> String {
    format!(
        "DEBIAN_FRONTEND=noninteractive apt-get remove -y {}",
        quote(&pkg.package)
    )
}

/// SHA-256 of a remote file
pub fn checksum(remote_path: &str) -> String {
    format!("sha256sum {}", quote(remote_path))
}

/// First field of `sha256sum` output
pub fn parse_checksum(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .next()
        .map(|digest| digest.to_ascii_lowercase())
}

pub fn set_mode(mode: &str, remote_path: &str) -> String {
    format!("chmod {} {}", quote(mode), quote(remote_path))
}

pub fn remove_file(remote_path: &str) -> String {
    format!("rm -f {}", quote(remote_path))
}
