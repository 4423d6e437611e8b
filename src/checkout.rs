//! Host bootstrap: base packages, install directory and the bot checkout.
//!
//! Runs before provisioning on a fresh server. Every operation is safe to
//! repeat: packages are installed with the package manager's own
//! idempotence and an existing checkout is fast-forwarded, not re-cloned.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::shell::{Invocation, Shell, ShellError};

/// Packages the bot and this provisioner need on the host.
pub const BASE_PACKAGES: &[&str] = &["git", "python3", "python3-venv", "python3-pip"];

/// Repository cloned when no override is given.
pub const DEFAULT_REPO_URL: &str = "https://github.com/user/realty-lead-userbot.git";

/// Default install location.
pub const DEFAULT_INSTALL_DIR: &str = "/opt/leadbot";

/// Errors that can occur while bootstrapping the host.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Package manager `apt-get` not found; only Debian-based hosts are supported")]
    NoPackageManager,

    #[error("{} exists but is not a git checkout; move it away or pick another --install-dir", .0.display())]
    NotACheckout(PathBuf),

    #[error("{} is missing after checking out {url}; check the repository URL or remove the corrupted checkout", .entry.display())]
    MissingEntryPoint { entry: PathBuf, url: String },

    #[error("Could not fast-forward the checkout in {}: {source}. Commit or discard local changes there, or remove it and re-run", .dir.display())]
    UpdateFailed {
        dir: PathBuf,
        #[source]
        source: ShellError,
    },

    #[error("Could not clone {url}: {source}. Check the repository URL and network access")]
    CloneFailed {
        url: String,
        #[source]
        source: ShellError,
    },

    #[error(transparent)]
    Command(#[from] ShellError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What `clone_or_update` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutAction {
    /// A fresh clone was made.
    Cloned,
    /// An existing checkout was fast-forwarded.
    Updated,
}

/// Where to fetch the bot from and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    /// Repository URL.
    pub repo_url: String,

    /// Checkout directory.
    pub install_dir: PathBuf,

    /// Account that owns the checkout.
    pub owner: String,

    /// Entry point file name expected in the checkout.
    pub entry_point: String,
}

impl BootstrapPlan {
    /// Path of the entry point inside the checkout.
    #[must_use]
    pub fn entry_path(&self) -> PathBuf {
        self.install_dir.join(&self.entry_point)
    }
}

/// Updates the package index and installs [`BASE_PACKAGES`].
///
/// # Errors
///
/// Returns an error if `apt-get` is missing or fails.
pub async fn install_base_packages<S: Shell>(shell: &S) -> Result<(), CheckoutError> {
    let probe = shell.run(&Invocation::new("apt-get").arg("--version")).await;
    match probe {
        Err(err) if err.missing_program().is_some() => return Err(CheckoutError::NoPackageManager),
        Err(err) => return Err(err.into()),
        Ok(_) => {}
    }

    info!("Installing base packages: {}", BASE_PACKAGES.join(" "));
    shell
        .check(&Invocation::new("apt-get").arg("update").elevated().inherit_output())
        .await?;
    shell
        .check(
            &Invocation::new("apt-get")
                .args(["install", "-y"])
                .args(BASE_PACKAGES.iter().copied())
                .elevated()
                .inherit_output(),
        )
        .await?;
    Ok(())
}

/// Creates the install directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn prepare_directory<S: Shell>(shell: &S, dir: &Path) -> Result<(), CheckoutError> {
    shell
        .check(
            &Invocation::new("mkdir")
                .arg("-p")
                .arg(dir.display().to_string())
                .elevated(),
        )
        .await?;
    Ok(())
}

/// Hands the install directory over to `owner`.
///
/// # Errors
///
/// Returns an error if `chown` fails.
pub async fn take_ownership<S: Shell>(shell: &S, dir: &Path, owner: &str) -> Result<(), CheckoutError> {
    shell
        .check(
            &Invocation::new("chown")
                .arg("-R")
                .arg(format!("{owner}:{owner}"))
                .arg(dir.display().to_string())
                .elevated(),
        )
        .await?;
    Ok(())
}

/// Clones `url` into `dir`, or fast-forwards an existing checkout there.
///
/// Git runs as `owner`, who owns the directory; git refuses to touch a
/// repository owned by someone else.
///
/// # Errors
///
/// Returns an error if `dir` holds something other than a checkout or git
/// fails.
pub async fn clone_or_update<S: Shell>(
    shell: &S,
    url: &str,
    dir: &Path,
    owner: &str,
) -> Result<CheckoutAction, CheckoutError> {
    let target = dir.display().to_string();

    if dir.join(".git").exists() {
        info!("Updating existing checkout in {}", target);
        shell
            .check(
                &Invocation::new("git")
                    .args(["-C", target.as_str(), "pull", "--ff-only"])
                    .run_as(owner),
            )
            .await
            .map_err(|source| CheckoutError::UpdateFailed {
                dir: dir.to_path_buf(),
                source,
            })?;
        return Ok(CheckoutAction::Updated);
    }

    if dir.is_dir() && std::fs::read_dir(dir)?.next().is_some() {
        return Err(CheckoutError::NotACheckout(dir.to_path_buf()));
    }

    info!("Cloning {} into {}", url, target);
    shell
        .check(
            &Invocation::new("git")
                .args(["clone", url, target.as_str()])
                .run_as(owner),
        )
        .await
        .map_err(|source| CheckoutError::CloneFailed {
            url: url.to_owned(),
            source,
        })?;
    Ok(CheckoutAction::Cloned)
}

/// Fails unless the checkout carries the expected entry point.
///
/// # Errors
///
/// Returns an error if the entry point is missing.
pub fn verify_entry_point(plan: &BootstrapPlan) -> Result<(), CheckoutError> {
    let entry = plan.entry_path();
    if entry.is_file() {
        Ok(())
    } else {
        Err(CheckoutError::MissingEntryPoint {
            entry,
            url: plan.repo_url.clone(),
        })
    }
}

/// Runs the whole bootstrap: packages, directory, checkout, ownership and
/// entry point verification.
///
/// # Errors
///
/// Returns the first failure; provisioning must not start after one.
pub async fn bootstrap<S: Shell>(shell: &S, plan: &BootstrapPlan) -> Result<CheckoutAction, CheckoutError> {
    install_base_packages(shell).await?;
    prepare_directory(shell, &plan.install_dir).await?;
    // The directory is root-owned right after mkdir; the owner needs it
    // before git runs as them.
    take_ownership(shell, &plan.install_dir, &plan.owner).await?;
    let action = clone_or_update(shell, &plan.repo_url, &plan.install_dir, &plan.owner).await?;
    take_ownership(shell, &plan.install_dir, &plan.owner).await?;
    verify_entry_point(plan)?;
    info!("Checkout ready in {} ({:?})", plan.install_dir.display(), action);
    Ok(action)
}
