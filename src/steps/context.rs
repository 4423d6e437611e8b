//! State accumulated while a plan runs.

use super::{Step, StepError};
use crate::prompt::OperatorParameters;

/// What earlier steps produced for later ones.
#[derive(Debug, Clone, Default)]
pub struct ProvisionContext {
    /// Account the bot runs as.
    pub identity: Option<String>,

    /// Values entered by the operator.
    pub parameters: Option<OperatorParameters>,

    /// Whether an existing isolated environment was reused.
    pub environment_reused: bool,

    /// Whether the configuration document was rewritten.
    pub config_changed: bool,

    /// Steps that finished, in order.
    pub completed: Vec<Step>,

    /// Steps whose precondition was already satisfied.
    pub satisfied: Vec<Step>,
}

impl ProvisionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolved service account.
    ///
    /// # Errors
    ///
    /// Returns an error if identity resolution has not run.
    pub fn identity(&self) -> Result<&str, StepError> {
        self.identity
            .as_deref()
            .ok_or(StepError::OutOfOrder(Step::ResolveIdentity))
    }

    /// The collected operator parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if parameter collection has not run.
    pub fn parameters(&self) -> Result<&OperatorParameters, StepError> {
        self.parameters
            .as_ref()
            .ok_or(StepError::OutOfOrder(Step::CollectParameters))
    }
}
