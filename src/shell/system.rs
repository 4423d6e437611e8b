//! Shell backed by real child processes.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Completed, Invocation, OutputMode, Shell, ShellError};

/// Runs invocations as child processes of this one.
///
/// Elevated invocations are prefixed with `sudo` unless the current process
/// already runs as root. Invocations bound to another account run through
/// `runuser` as root and through `sudo -u` otherwise.
#[derive(Debug, Clone, Default)]
pub struct SystemShell {
    escalate: bool,
    user: Option<String>,
}

impl SystemShell {
    /// Creates a shell that never prefixes commands with `sudo`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            escalate: false,
            user: None,
        }
    }

    /// Creates a shell that escalates elevated commands when not root.
    ///
    /// Root is detected through `id -u`; if that cannot run, escalation is
    /// assumed to be needed.
    pub async fn detect() -> Self {
        let probe = Self::new();
        let is_root = match probe.run(&Invocation::new("id").arg("-u")).await {
            Ok(done) if done.success() => done.stdout.trim() == "0",
            Ok(_) | Err(_) => false,
        };
        let user = match probe.run(&Invocation::new("id").arg("-un")).await {
            Ok(done) if done.success() => Some(done.stdout.trim().to_owned()),
            Ok(_) | Err(_) => None,
        };
        debug!("Running as {:?} (root: {})", user, is_root);
        Self {
            escalate: !is_root,
            user,
        }
    }

    /// Returns true if elevated commands are run through `sudo`.
    #[must_use]
    pub const fn escalates(&self) -> bool {
        self.escalate
    }

    /// Program and arguments actually spawned for `invocation`.
    fn argv(&self, invocation: &Invocation) -> (String, Vec<String>) {
        let mut args = Vec::with_capacity(invocation.args.len() + 4);

        let switch_to = invocation
            .run_as
            .as_deref()
            .filter(|user| self.user.as_deref() != Some(*user));

        let program = match switch_to {
            Some(user) if self.escalate => {
                args.extend(["-u".to_owned(), user.to_owned()]);
                args.push(invocation.program.clone());
                "sudo".to_owned()
            }
            Some(user) => {
                args.extend(["-u".to_owned(), user.to_owned(), "--".to_owned()]);
                args.push(invocation.program.clone());
                "runuser".to_owned()
            }
            None if invocation.elevated && self.escalate => {
                args.push(invocation.program.clone());
                "sudo".to_owned()
            }
            None => invocation.program.clone(),
        };

        args.extend(invocation.args.iter().cloned());
        (program, args)
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let (program, args) = self.argv(invocation);
        let mut command = Command::new(program);

        command.args(args);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &invocation.env {
            command.env(key, value);
        }

        command.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        match invocation.output {
            OutputMode::Capture => {
                command.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Inherit => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }
        command
    }
}

impl Shell for SystemShell {
    async fn run(&self, invocation: &Invocation) -> Result<Completed, ShellError> {
        debug!("Running: {}", invocation);

        let (program, _) = self.argv(invocation);

        let mut child = self
            .command(invocation)
            .spawn()
            .map_err(|source| ShellError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(data) = &invocation.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin
                .write_all(data.as_bytes())
                .await
                .map_err(|source| ShellError::Io {
                    program: program.clone(),
                    source,
                })?;
            // Dropping the handle closes the pipe so the child sees EOF.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ShellError::Io { program, source })?;

        Ok(Completed {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    fn shell_as(user: &str, escalate: bool) -> SystemShell {
        SystemShell {
            escalate,
            user: Some(user.to_owned()),
        }
    }

    #[test]
    fn test_root_switches_to_owner_with_runuser() {
        let inv = Invocation::new("git")
            .args(["-C", "/opt/leadbot", "pull", "--ff-only"])
            .run_as("deploy");

        let (program, args) = shell_as("root", false).argv(&inv);
        assert_eq!(program, "runuser");
        assert_eq!(
            args,
            ["-u", "deploy", "--", "git", "-C", "/opt/leadbot", "pull", "--ff-only"]
        );
    }

    #[test]
    fn test_operator_switches_to_owner_with_sudo() {
        let inv = Invocation::new("git").arg("pull").run_as("deploy");

        let (program, args) = shell_as("alice", true).argv(&inv);
        assert_eq!(program, "sudo");
        assert_eq!(args, ["-u", "deploy", "git", "pull"]);
    }

    #[test]
    fn test_owner_matching_current_user_runs_directly() {
        let inv = Invocation::new("git").arg("pull").run_as("deploy");

        let (program, args) = shell_as("deploy", true).argv(&inv);
        assert_eq!(program, "git");
        assert_eq!(args, ["pull"]);
    }

    #[test]
    fn test_elevation_only_prefixes_sudo_when_not_root() {
        let inv = Invocation::new("systemctl").arg("daemon-reload").elevated();

        assert_eq!(shell_as("alice", true).argv(&inv).0, "sudo");
        assert_eq!(shell_as("root", false).argv(&inv).0, "systemctl");
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let shell = SystemShell::new();
        let done = shell
            .run(&Invocation::new("echo").arg("hello"))
            .await
            .unwrap();
        assert!(done.success());
        assert_eq!(done.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_feeds_stdin() {
        let shell = SystemShell::new();
        let done = shell
            .run(&Invocation::new("cat").stdin("piped text"))
            .await
            .unwrap();
        assert_eq!(done.stdout, "piped text");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let shell = SystemShell::new();
        let err = shell
            .run(&Invocation::new("definitely-not-a-real-binary-4821"))
            .await
            .unwrap_err();
        assert_eq!(err.missing_program(), Some("definitely-not-a-real-binary-4821"));
    }

    #[tokio::test]
    async fn test_check_reports_non_zero_exit() {
        let shell = SystemShell::new();
        let err = shell.check(&Invocation::new("false")).await.unwrap_err();
        assert!(matches!(err, ShellError::Failed { code: Some(1), .. }));
    }
}
