//! SSH transport for the reconcile engine
//!
//! Shells out to the system `ssh` and `scp`. When a resource carries a
//! password, both are wrapped in `sshpass -e` and the secret travels in the
//! `SSHPASS` environment variable, never on the command line.

use crate::config::SshSettings;
use reconcile::{Error, HostTarget, RemoteExecutor, Result};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, ExitStatus, Output};

/// ssh exits with 255 when it could not reach or authenticate to the host
const SSH_CONNECTION_FAILURE: i32 = 255;

/// sshpass's own failures: runtime error, unexpected ssh output, rejected
/// password, unknown host key. Lower codes collide with remote exit codes
/// the engine interprets (`dpkg-query`, `sha256sum`).
const SSHPASS_CONNECTION_FAILURES: std::ops::RangeInclusive<i32> = 3..=6;

/// Programs the executor runs
#[derive(Debug, Clone)]
struct Programs {
    ssh: PathBuf,
    scp: PathBuf,
    sshpass: PathBuf,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            ssh: "ssh".into(),
            scp: "scp".into(),
            sshpass: "sshpass".into(),
        }
    }
}

pub struct SshExecutor {
    user: String,
    port: u16,
    connect_timeout: u32,
    programs: Programs,
}

impl SshExecutor {
    pub fn new(settings: &SshSettings) -> Self {
        Self {
            user: settings.user.clone(),
            port: settings.port,
            connect_timeout: settings.connect_timeout,
            programs: Programs::default(),
        }
    }

    fn destination(&self, target: &HostTarget) -> String {
        format!("{}@{}", self.user, target.address)
    }

    fn options(&self, target: &HostTarget) -> Vec<String> {
        let mut opts = vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
        ];
        // sshpass needs the password prompt that batch mode suppresses
        if target.credential.is_empty() {
            opts.push("-o".to_string());
            opts.push("BatchMode=yes".to_string());
        }
        opts
    }

    /// Arguments for running `command` over ssh
    pub fn ssh_args(&self, target: &HostTarget, command: &str) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.port.to_string()];
        args.extend(self.options(target));
        args.push("--".to_string());
        args.push(self.destination(target));
        args.push(command.to_string());
        args
    }

    /// Arguments for copying `local` to `remote_path` over scp
    pub fn scp_args(&self, target: &HostTarget, local: &Path, remote_path: &str) -> Vec<String> {
        let mut args = vec!["-P".to_string(), self.port.to_string()];
        args.extend(self.options(target));
        args.push("--".to_string());
        args.push(local_operand(local));
        args.push(format!("{}:{}", self.destination(target), remote_path));
        args
    }

    fn command(&self, program: &Path, target: &HostTarget, args: &[String]) -> Command {
        if target.credential.is_empty() {
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        } else {
            let mut cmd = Command::new(&self.programs.sshpass);
            cmd.arg("-e")
                .arg(program)
                .args(args)
                .env("SSHPASS", target.credential.expose());
            cmd
        }
    }

    fn spawn(&self, program: &Path, target: &HostTarget, args: &[String]) -> std::io::Result<Output> {
        log::trace!("{} {}", program.display(), args.join(" "));
        self.command(program, target, args).output()
    }
}

/// scp reads any operand with a `:` before the first `/` as `host:path`
fn local_operand(local: &Path) -> String {
    let shown = local.to_string_lossy().into_owned();
    match local.components().next() {
        Some(Component::Normal(_)) => format!("./{shown}"),
        _ => shown,
    }
}

/// Whether an exit status means the host was never reached
fn is_connection_failure(status: ExitStatus, wrapped: bool) -> bool {
    match status.code() {
        Some(SSH_CONNECTION_FAILURE) => true,
        Some(code) => wrapped && SSHPASS_CONNECTION_FAILURES.contains(&code),
        // killed by a signal
        None => true,
    }
}

impl RemoteExecutor for SshExecutor {
    fn run_command(&self, target: &HostTarget, command: &str) -> Result<String> {
        let args = self.ssh_args(target, command);
        let output = self
            .spawn(&self.programs.ssh, target, &args)
            .map_err(|e| Error::RemoteConnection {
                host: target.address.clone(),
                message: format!("failed to start ssh: {e}"),
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_connection_failure(output.status, !target.credential.is_empty()) {
            Err(Error::RemoteConnection {
                host: target.address.clone(),
                message: if stderr.is_empty() {
                    format!("ssh failed with {}", output.status)
                } else {
                    stderr
                },
            })
        } else {
            Err(Error::RemoteCommand {
                host: target.address.clone(),
                command: command.to_string(),
                stderr,
            })
        }
    }

    fn upload_file(&self, target: &HostTarget, local: &Path, remote_path: &str) -> Result<()> {
        let transfer_error = |message: String| Error::Transfer {
            host: target.address.clone(),
            local: local.display().to_string(),
            remote: remote_path.to_string(),
            message,
        };

        let args = self.scp_args(target, local, remote_path);
        let output = self
            .spawn(&self.programs.scp, target, &args)
            .map_err(|e| transfer_error(format!("failed to start scp: {e}")))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(transfer_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::Credential;

    fn executor() -> SshExecutor {
        SshExecutor::new(&SshSettings {
            user: "deploy".into(),
            port: 2222,
            connect_timeout: 5,
        })
    }

    fn target(password: &str) -> HostTarget {
        HostTarget {
            address: "10.0.0.5".into(),
            credential: Credential::new(password),
        }
    }

    #[test]
    fn test_ssh_args_key_auth() {
        let args = executor().ssh_args(&target(""), "uptime");
        assert_eq!(
            args,
            [
                "-p",
                "2222",
                "-o",
                "ConnectTimeout=5",
                "-o",
                "BatchMode=yes",
                "--",
                "deploy@10.0.0.5",
                "uptime",
            ]
        );
    }

    #[test]
    fn test_password_never_on_command_line() {
        let t = target("hunter2");
        let args = executor().ssh_args(&t, "uptime");
        assert!(!args.iter().any(|a| a.contains("hunter2")));
        assert!(!args.iter().any(|a| a == "BatchMode=yes"));

        let cmd = executor().command(Path::new("ssh"), &t, &args);
        assert_eq!(cmd.get_program(), "sshpass");
        let envs: Vec<_> = cmd.get_envs().collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].0, "SSHPASS");
    }

    #[test]
    fn test_scp_args() {
        let args = executor().scp_args(&target(""), Path::new("site/index.html"), "/var/www/index.html");
        assert_eq!(args[0], "-P");
        assert_eq!(args[1], "2222");
        assert_eq!(args[args.len() - 3], "--");
        assert_eq!(args[args.len() - 2], "./site/index.html");
        assert_eq!(args[args.len() - 1], "deploy@10.0.0.5:/var/www/index.html");
    }

    #[test]
    fn test_local_operand_never_looks_remote() {
        assert_eq!(local_operand(Path::new("a:b/index.html")), "./a:b/index.html");
        assert_eq!(local_operand(Path::new("/srv/site/x")), "/srv/site/x");
        assert_eq!(local_operand(Path::new("./site/x")), "./site/x");
        assert_eq!(local_operand(Path::new("../site/x")), "../site/x");
    }

    /// Executor whose programs are shell scripts exiting with `code`
    #[cfg(unix)]
    fn stubbed(dir: &Path, code: i32, stdout: &str) -> SshExecutor {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join(format!("stub-{code}"));
        std::fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s' '{stdout}'\necho 'stub failure' >&2\nexit {code}\n"),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut executor = executor();
        executor.programs = Programs {
            ssh: script.clone(),
            scp: script.clone(),
            sshpass: script,
        };
        executor
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let key = target("");

        let out = stubbed(dir.path(), 0, "ok").run_command(&key, "uptime").unwrap();
        assert_eq!(out, "ok");

        let err = stubbed(dir.path(), 255, "").run_command(&key, "uptime").unwrap_err();
        assert!(matches!(err, Error::RemoteConnection { ref message, .. } if message == "stub failure"));

        let err = stubbed(dir.path(), 1, "").run_command(&key, "uptime").unwrap_err();
        assert!(matches!(err, Error::RemoteCommand { ref command, .. } if command == "uptime"));

        // sshpass codes only count as connection failures when sshpass is in use
        let err = stubbed(dir.path(), 5, "").run_command(&key, "uptime").unwrap_err();
        assert!(matches!(err, Error::RemoteCommand { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_sshpass_failures_are_connection_errors() {
        let dir = tempfile::tempdir().unwrap();
        let password = target("hunter2");

        for code in [3, 4, 5, 6, 255] {
            let err = stubbed(dir.path(), code, "")
                .run_command(&password, "dpkg-query --show nginx")
                .unwrap_err();
            assert!(matches!(err, Error::RemoteConnection { .. }), "exit {code}: {err:?}");
        }

        // dpkg-query and sha256sum report absence with 1
        let err = stubbed(dir.path(), 1, "")
            .run_command(&password, "dpkg-query --show nginx")
            .unwrap_err();
        assert!(matches!(err, Error::RemoteCommand { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_scp_failure_is_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let local = Path::new("site/index.html");

        stubbed(dir.path(), 0, "")
            .upload_file(&target(""), local, "/var/www/index.html")
            .unwrap();

        let err = stubbed(dir.path(), 1, "")
            .upload_file(&target(""), local, "/var/www/index.html")
            .unwrap_err();
        assert!(matches!(err, Error::Transfer { ref remote, .. } if remote == "/var/www/index.html"));
    }

    #[test]
    fn test_missing_program_is_connection_error() {
        let mut executor = executor();
        executor.programs.ssh = PathBuf::from("/nonexistent/convoy-ssh");
        let err = executor.run_command(&target(""), "uptime").unwrap_err();
        assert!(matches!(err, Error::RemoteConnection { .. }));
    }
}
