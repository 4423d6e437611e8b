//! Supervised service registration.
//!
//! Installs the bot as a systemd service that restarts on failure and
//! starts at boot.

mod unit;

use std::path::Path;

use tracing::{debug, info};

pub use unit::ServiceUnit;

use crate::shell::{Invocation, Shell, ShellError};

/// How the installed unit file compares to the desired one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// No unit file installed yet.
    Missing,
    /// Installed with different content.
    Outdated,
    /// Installed with identical content.
    Current,
}

/// Compares the unit file at `path` with `rendered`.
#[must_use]
pub fn installed_state(path: &Path, rendered: &str) -> UnitState {
    match std::fs::read_to_string(path) {
        Ok(existing) if existing == rendered => UnitState::Current,
        Ok(_) => UnitState::Outdated,
        Err(_) => UnitState::Missing,
    }
}

fn systemctl<I, A>(args: I) -> Invocation
where
    I: IntoIterator<Item = A>,
    A: Into<String>,
{
    Invocation::new("systemctl").args(args)
}

/// Writes the unit file and reloads the service manager.
///
/// # Errors
///
/// Returns an error if writing the file or reloading fails.
pub async fn install_unit<S: Shell>(
    shell: &S,
    path: &Path,
    rendered: &str,
) -> Result<(), ShellError> {
    info!("Writing unit file {}", path.display());
    shell
        .check(
            &Invocation::new("tee")
                .arg(path.display().to_string())
                .stdin(rendered)
                .elevated(),
        )
        .await?;
    shell
        .check(&systemctl(["daemon-reload"]).elevated().inherit_output())
        .await?;
    Ok(())
}

/// Enables the service at boot and (re)starts it now.
///
/// # Errors
///
/// Returns an error if either `systemctl` call fails.
pub async fn enable_and_restart<S: Shell>(shell: &S, name: &str) -> Result<(), ShellError> {
    shell
        .check(&systemctl(["enable", name]).elevated().inherit_output())
        .await?;
    shell
        .check(&systemctl(["restart", name]).elevated().inherit_output())
        .await?;
    info!("Service {} enabled and restarted", name);
    Ok(())
}

/// Reads the service status without elevation.
///
/// `systemctl status` exits non-zero for stopped units but still prints a
/// report, so only an empty report counts as failure.
///
/// # Errors
///
/// Returns an error if `systemctl` cannot run or prints nothing.
pub async fn status<S: Shell>(shell: &S, name: &str) -> Result<String, ShellError> {
    let invocation = systemctl(["status", name, "--no-pager", "--lines", "10"]);
    let done = shell.run(&invocation).await?;
    debug!("systemctl status exited with {:?}", done.code);

    if done.stdout.trim().is_empty() {
        return Err(ShellError::Failed {
            command: invocation.to_string(),
            code: done.code,
            stderr: done.stderr,
        });
    }
    Ok(done.stdout)
}
