//! Provisioning steps and the runner that drives them.
//!
//! A run is an ordered list of [`Step`] descriptors. Each step checks a
//! precondition, performs its action and leaves an artifact behind. Every
//! step is idempotent, so re-running the whole list is the recovery path
//! after any failure.

mod context;
mod host;
mod operator;
mod runner;

use std::fmt;

use thiserror::Error;

pub use context::ProvisionContext;
pub use runner::Provisioner;

use crate::config::{DocumentError, SecretsError};
use crate::prompt::PromptError;
use crate::shell::ShellError;

/// One provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Decide which account the bot runs as.
    ResolveIdentity,
    /// Make sure the host interpreter exists.
    RequireInterpreter,
    /// Create or reuse the isolated runtime environment.
    CreateEnvironment,
    /// Install the bot's dependencies into the environment.
    InstallDependencies,
    /// Ask the operator for credentials and identifiers.
    CollectParameters,
    /// Write the secret file with owner-only permissions.
    PersistSecrets,
    /// Merge the notification target into the bot's configuration.
    MergeBotConfig,
    /// Byte-compile the bot's entry point.
    CheckEntryPoint,
    /// Install, enable and restart the supervised service.
    RegisterService,
    /// Show the service status.
    ReportStatus,
}

impl Step {
    /// Human-readable step name used in progress and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ResolveIdentity => "resolve execution identity",
            Self::RequireInterpreter => "check python interpreter",
            Self::CreateEnvironment => "prepare virtual environment",
            Self::InstallDependencies => "install dependencies",
            Self::CollectParameters => "collect operator parameters",
            Self::PersistSecrets => "write secret file",
            Self::MergeBotConfig => "update bot configuration",
            Self::CheckEntryPoint => "validate bot entry point",
            Self::RegisterService => "register service",
            Self::ReportStatus => "report service status",
        }
    }

    /// Whether a failure aborts the run.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::ReportStatus)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which steps a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Full install as a supervised background service.
    Service,
    /// Prepare everything needed for a foreground run.
    Local,
}

const SERVICE_STEPS: &[Step] = &[
    Step::ResolveIdentity,
    Step::RequireInterpreter,
    Step::CreateEnvironment,
    Step::InstallDependencies,
    Step::CollectParameters,
    Step::PersistSecrets,
    Step::MergeBotConfig,
    Step::CheckEntryPoint,
    Step::RegisterService,
    Step::ReportStatus,
];

impl Plan {
    /// Steps of this plan in execution order.
    #[must_use]
    pub fn steps(self) -> &'static [Step] {
        match self {
            Self::Service => SERVICE_STEPS,
            Self::Local => &SERVICE_STEPS[..7],
        }
    }
}

/// Result of a step's precondition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The step's artifact is missing or stale.
    Pending,
    /// The artifact already exists; the detail says what was found.
    Satisfied(String),
}

/// Why a step failed.
#[derive(Debug, Error)]
pub enum StepError {
    /// A required tool or account is missing on the host.
    #[error("{0}")]
    Environment(String),

    /// The checkout or the bot itself is unusable.
    #[error("{0}")]
    Integration(String),

    /// The step lacked the privileges it needed.
    #[error("{0}")]
    Privilege(String),

    #[error(transparent)]
    Command(ShellError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Secrets(#[from] SecretsError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{0}` has not run yet")]
    OutOfOrder(Step),
}

impl From<ShellError> for StepError {
    fn from(err: ShellError) -> Self {
        match err.missing_program() {
            Some(program) => Self::Environment(format!(
                "`{program}` is not installed or not on PATH"
            )),
            None => Self::Command(err),
        }
    }
}

/// A fatal step failure that ended the run.
#[derive(Debug, Error)]
#[error("Step {position}/{total} ({step}) failed")]
pub struct ProvisionError {
    /// The failing step.
    pub step: Step,
    /// One-based position of the step in the plan.
    pub position: usize,
    /// Number of steps in the plan.
    pub total: usize,
    #[source]
    pub source: StepError,
}
