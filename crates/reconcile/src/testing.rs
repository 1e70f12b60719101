//! In-memory host used by the engine's tests

use crate::context::RemoteExecutor;
use crate::error::{Error, Result};
use crate::types::HostTarget;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct HostInner {
    files: BTreeMap<String, Vec<u8>>,
    modes: BTreeMap<String, String>,
    packages: BTreeMap<String, String>,
    commands: Vec<String>,
    uploads: Vec<String>,
    fail_on: Vec<String>,
}

/// Simulates a Debian host: files, modes, and a package database.
///
/// Understands the command lines built by [`crate::shell`]; anything else
/// succeeds with an echo of the command.
#[derive(Default)]
pub(crate) struct FakeHost {
    inner: Mutex<HostInner>,
    unreachable: bool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a connection error
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    fn inner(&self) -> MutexGuard<'_, HostInner> {
        self.inner.lock().unwrap()
    }

    pub fn put_file(&self, path: &str, content: &[u8]) {
        self.inner().files.insert(path.to_string(), content.to_vec());
    }

    pub fn put_package(&self, name: &str, version: &str) {
        self.inner()
            .packages
            .insert(name.to_string(), version.to_string());
    }

    /// Fail any command (or upload destination) containing `pattern`
    pub fn fail_on(&self, pattern: &str) {
        self.inner().fail_on.push(pattern.to_string());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.inner().files.get(path).cloned()
    }

    pub fn mode(&self, path: &str) -> Option<String> {
        self.inner().modes.get(path).cloned()
    }

    pub fn package(&self, name: &str) -> Option<String> {
        self.inner().packages.get(name).cloned()
    }

    pub fn commands(&self) -> Vec<String> {
        self.inner().commands.clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.inner().uploads.clone()
    }

    /// Commands that change the host (everything but queries)
    pub fn mutations(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| !c.starts_with("dpkg-query") && !c.starts_with("sha256sum"))
            .chain(self.uploads())
            .collect()
    }

    fn run_segment(inner: &mut HostInner, host: &str, segment: &str) -> Result<String> {
        let words: Vec<String> = shell_words::split(segment.trim())
            .unwrap()
            .into_iter()
            .skip_while(|w| w.contains('=') && !w.starts_with('-'))
            .collect();
        let failed = |stderr: String| Error::RemoteCommand {
            host: host.to_string(),
            command: segment.trim().to_string(),
            stderr,
        };
        let last = words.last().cloned().unwrap_or_default();

        match words.first().map(String::as_str) {
            Some("dpkg-query") => match inner.packages.get(&last) {
                Some(version) => Ok(format!("install ok installed|{version}")),
                None => Err(failed(format!(
                    "dpkg-query: no packages found matching {last}"
                ))),
            },
            Some("sha256sum") => match inner.files.get(&last) {
                Some(content) => Ok(format!("{:x}  {last}\n", Sha256::digest(content))),
                None => Err(failed(format!("sha256sum: {last}: No such file or directory"))),
            },
            Some("apt-get") => {
                match words.get(1).map(String::as_str) {
                    Some("install") => {
                        let (name, version) = last.split_once('=').unwrap_or((last.as_str(), "1.0-fake"));
                        inner.packages.insert(name.to_string(), version.to_string());
                    }
                    Some("remove") => {
                        inner.packages.remove(&last);
                    }
                    _ => {}
                }
                Ok(String::new())
            }
            Some("chmod") => {
                if !inner.files.contains_key(&last) {
                    return Err(failed(format!("chmod: cannot access '{last}'")));
                }
                inner.modes.insert(last.clone(), words[1].clone());
                Ok(String::new())
            }
            Some("rm") => {
                inner.files.remove(&last);
                inner.modes.remove(&last);
                Ok(String::new())
            }
            _ => Ok(format!("ran: {}\n", segment.trim())),
        }
    }
}

impl RemoteExecutor for FakeHost {
    fn run_command(&self, target: &HostTarget, command: &str) -> Result<String> {
        if self.unreachable {
            return Err(Error::RemoteConnection {
                host: target.address.clone(),
                message: "connection refused".into(),
            });
        }
        let mut inner = self.inner();
        inner.commands.push(command.to_string());
        if inner.fail_on.iter().any(|p| command.contains(p.as_str())) {
            return Err(Error::RemoteCommand {
                host: target.address.clone(),
                command: command.to_string(),
                stderr: "injected failure".into(),
            });
        }

        let mut stdout = String::new();
        for segment in command.split("&&") {
            stdout.push_str(&Self::run_segment(&mut inner, &target.address, segment)?);
        }
        Ok(stdout)
    }

    fn upload_file(&self, target: &HostTarget, local: &Path, remote_path: &str) -> Result<()> {
        let transfer_error = |message: String| Error::Transfer {
            host: target.address.clone(),
            local: local.display().to_string(),
            remote: remote_path.to_string(),
            message,
        };
        if self.unreachable {
            return Err(transfer_error("connection refused".into()));
        }
        let mut inner = self.inner();
        if inner.fail_on.iter().any(|p| remote_path.contains(p.as_str())) {
            return Err(transfer_error("injected failure".into()));
        }
        let content = std::fs::read(local).map_err(|e| transfer_error(e.to_string()))?;
        inner.files.insert(remote_path.to_string(), content);
        inner.uploads.push(remote_path.to_string());
        Ok(())
    }
}
