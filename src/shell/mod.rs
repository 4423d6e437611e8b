//! Command execution for provisioning steps.
//!
//! Every host side effect that is not a plain file write goes through the
//! [`Shell`] trait, so steps can be exercised against a recording shell.

mod system;

#[cfg(test)]
pub(crate) mod recording;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use system::SystemShell;

/// Errors that can occur while running an external command.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error while talking to `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ShellError {
    /// Returns the program name when the command could not be found at all.
    #[must_use]
    pub fn missing_program(&self) -> Option<&str> {
        match self {
            Self::Spawn { program, source } if source.kind() == std::io::ErrorKind::NotFound => {
                Some(program)
            }
            _ => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"))
}

fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// How the child's standard output and error are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Collect output so the caller can inspect it.
    #[default]
    Capture,
    /// Stream output straight to the operator's terminal.
    Inherit,
}

/// A single command to run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path.
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Working directory for the child.
    pub current_dir: Option<PathBuf>,

    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,

    /// Data written to the child's stdin.
    pub stdin: Option<String>,

    /// Whether the command needs root privileges.
    pub elevated: bool,

    /// Account the command must run as, if not the current one.
    pub run_as: Option<String>,

    /// Output handling.
    pub output: OutputMode,
}

impl Invocation {
    /// Creates an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            stdin: None,
            elevated: false,
            run_as: None,
            output: OutputMode::Capture,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Feeds `data` to the child's stdin.
    #[must_use]
    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Marks the command as requiring root.
    #[must_use]
    pub const fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    /// Runs the command as `user`.
    #[must_use]
    pub fn run_as(mut self, user: impl Into<String>) -> Self {
        self.run_as = Some(user.into());
        self
    }

    /// Streams output to the terminal instead of capturing it.
    #[must_use]
    pub const fn inherit_output(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    /// Returns true if the first argument equals `arg`.
    #[must_use]
    pub fn first_arg_is(&self, arg: &str) -> bool {
        self.args.first().is_some_and(|a| a == arg)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.run_as {
            write!(f, "sudo -u {user} ")?;
        } else if self.elevated {
            f.write_str("sudo ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completed {
    /// Exit code, `None` if the child was killed by a signal.
    pub code: Option<i32>,

    /// Captured stdout (empty for inherited output).
    pub stdout: String,

    /// Captured stderr (empty for inherited output).
    pub stderr: String,
}

impl Completed {
    /// A successful completion with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed completion with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs commands on the provisioned host.
#[allow(async_fn_in_trait)]
pub trait Shell {
    /// Runs `invocation` to completion and reports its exit status.
    ///
    /// A non-zero exit is not an error at this level.
    async fn run(&self, invocation: &Invocation) -> Result<Completed, ShellError>;

    /// Runs `invocation` and fails unless it exits with status 0.
    async fn check(&self, invocation: &Invocation) -> Result<Completed, ShellError> {
        let completed = self.run(invocation).await?;
        if completed.success() {
            Ok(completed)
        } else {
            Err(ShellError::Failed {
                command: invocation.to_string(),
                code: completed.code,
                stderr: completed.stderr,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_marks_elevation() {
        let inv = Invocation::new("systemctl").args(["enable", "leadbot"]).elevated();
        assert_eq!(inv.to_string(), "sudo systemctl enable leadbot");
    }

    #[test]
    fn test_display_marks_account_switch() {
        let inv = Invocation::new("git").arg("pull").run_as("deploy");
        assert_eq!(inv.to_string(), "sudo -u deploy git pull");
    }

    #[test]
    fn test_failed_message_includes_stderr() {
        let err = ShellError::Failed {
            command: "git pull".to_owned(),
            code: Some(1),
            stderr: "fatal: not a git repository\n".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "`git pull` exited with status 1: fatal: not a git repository"
        );
    }

    #[test]
    fn test_missing_program_only_for_not_found() {
        let missing = ShellError::Spawn {
            program: "python3".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(missing.missing_program(), Some("python3"));

        let denied = ShellError::Spawn {
            program: "python3".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(denied.missing_program().is_none());
    }
}
