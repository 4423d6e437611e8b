//! Steps that prepare the host: identity, interpreter, environment,
//! dependencies and the bot's entry point.

use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use super::{Precondition, StepError};
use crate::config::{FALLBACK_PACKAGES, ProvisionSettings};
use crate::shell::{Invocation, Shell};

pub(super) async fn resolve_identity<S: Shell>(
    shell: &S,
    settings: &ProvisionSettings,
) -> Result<String, StepError> {
    let user = match settings
        .service_user
        .clone()
        .or_else(|| settings.invoking_user.clone())
    {
        Some(user) => user,
        None => shell
            .check(&Invocation::new("id").arg("-un"))
            .await?
            .stdout
            .trim()
            .to_owned(),
    };

    if user.is_empty() {
        return Err(StepError::Environment(
            "Could not determine the account to run the bot as; pass --service-user".to_owned(),
        ));
    }

    let known = shell.run(&Invocation::new("id").args(["-u", user.as_str()])).await?;
    if !known.success() {
        return Err(StepError::Environment(format!(
            "Account `{user}` does not exist on this host"
        )));
    }

    info!("Bot will run as `{}`", user);
    Ok(user)
}

pub(super) async fn require_interpreter<S: Shell>(
    shell: &S,
    settings: &ProvisionSettings,
) -> Result<(), StepError> {
    let probe = Invocation::new(&settings.python).arg("--version");
    match shell.check(&probe).await {
        Ok(done) => {
            // Older interpreters print the version on stderr.
            let version = [done.stdout.trim(), done.stderr.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("unknown version");
            info!("Using {} ({})", settings.python, version);
            Ok(())
        }
        Err(err) if err.missing_program().is_some() => Err(StepError::Environment(format!(
            "`{}` was not found. Install it first, e.g. `apt-get install python3 python3-venv`",
            settings.python
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Existing environment, described by its creation time.
pub(super) fn environment_precondition(settings: &ProvisionSettings) -> Precondition {
    if settings.venv_python().is_file() {
        Precondition::Satisfied(format!("created {}", created_at(&settings.venv_dir)))
    } else {
        Precondition::Pending
    }
}

fn created_at(path: &Path) -> String {
    std::fs::metadata(path)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .map_or_else(
            |_| "at an unknown time".to_owned(),
            |time| {
                DateTime::<Local>::from(time)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        )
}

/// Returns true if an existing environment was reused.
pub(super) async fn create_environment<S: Shell>(
    shell: &S,
    settings: &ProvisionSettings,
    precondition: &Precondition,
) -> Result<bool, StepError> {
    let venv = settings.venv_dir.display().to_string();

    if let Precondition::Satisfied(detail) = precondition {
        let probe = Invocation::new(settings.venv_python().display().to_string()).arg("--version");
        if shell.run(&probe).await.is_ok_and(|done| done.success()) {
            info!("Reusing virtual environment {} ({})", venv, detail);
            return Ok(true);
        }

        warn!("Virtual environment {} is broken, recreating it", venv);
        shell
            .check(
                &Invocation::new(&settings.python)
                    .args(["-m", "venv", "--clear"])
                    .arg(venv),
            )
            .await?;
        return Ok(false);
    }

    info!("Creating virtual environment {}", venv);
    shell
        .check(&Invocation::new(&settings.python).args(["-m", "venv"]).arg(venv))
        .await?;
    Ok(false)
}

pub(super) async fn install_dependencies<S: Shell>(
    shell: &S,
    settings: &ProvisionSettings,
) -> Result<(), StepError> {
    let pip = || {
        Invocation::new(settings.venv_python().display().to_string())
            .args(["-m", "pip", "install", "--disable-pip-version-check"])
            .inherit_output()
    };

    shell.check(&pip().args(["--upgrade", "pip"])).await?;

    if settings.has_requirements() {
        info!("Installing {}", settings.requirements.display());
        shell
            .check(&pip().arg("-r").arg(settings.requirements.display().to_string()))
            .await?;
    } else {
        warn!(
            "No {} in the checkout, installing {}",
            settings.requirements.display(),
            FALLBACK_PACKAGES.join(", ")
        );
        shell.check(&pip().args(FALLBACK_PACKAGES.iter().copied())).await?;
    }
    Ok(())
}

pub(super) async fn check_entry_point<S: Shell>(
    shell: &S,
    settings: &ProvisionSettings,
) -> Result<(), StepError> {
    let entry = settings.entry_point.display().to_string();
    if !settings.entry_point.is_file() {
        return Err(StepError::Integration(format!(
            "Entry point {entry} not found; the checkout is incomplete or from the wrong repository"
        )));
    }

    let compile = Invocation::new(settings.venv_python().display().to_string())
        .args(["-m", "py_compile"])
        .arg(&entry)
        .current_dir(&settings.app_dir);
    let done = shell.run(&compile).await?;
    if !done.success() {
        return Err(StepError::Integration(format!(
            "{entry} does not compile; fix the syntax error before installing:\n{}",
            done.stderr.trim()
        )));
    }

    info!("{} compiles cleanly", entry);
    Ok(())
}
