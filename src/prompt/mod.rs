//! Operator prompts.
//!
//! Collecting input never fails on a bad answer: the validator's error is
//! shown and the question is asked again.

mod terminal;
pub mod validate;

use std::fmt;

use thiserror::Error;
use tracing::debug;

pub use terminal::TerminalPrompter;
pub use validate::InputError;

/// Errors that stop prompting altogether.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Terminal interaction failed: {0}")]
    Terminal(#[from] dialoguer::Error),

    #[error("Input closed before {field} was answered")]
    Closed { field: String },
}

/// A question put to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Prompt text.
    pub label: String,

    /// Whether the answer must not be echoed.
    pub hidden: bool,
}

impl Field {
    /// A question answered with echo.
    #[must_use]
    pub fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hidden: false,
        }
    }

    /// A question answered without echo.
    #[must_use]
    pub fn hidden(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hidden: true,
        }
    }
}

/// Source of operator answers.
pub trait Prompter {
    /// Reads one raw answer to `field`.
    ///
    /// # Errors
    ///
    /// Returns an error if no answer can be read.
    fn read(&mut self, field: &Field) -> Result<String, PromptError>;

    /// Tells the operator why the last answer was rejected.
    fn reject(&mut self, field: &Field, error: &InputError);
}

/// Asks `field` until `validate` accepts the answer.
///
/// # Errors
///
/// Returns an error only if the prompter itself fails.
pub fn ask_until_valid<P, T, F>(prompter: &mut P, field: &Field, validate: F) -> Result<T, PromptError>
where
    P: Prompter + ?Sized,
    F: Fn(&str) -> Result<T, InputError>,
{
    loop {
        let raw = prompter.read(field)?;
        match validate(&raw) {
            Ok(value) => return Ok(value),
            Err(error) => {
                debug!("Rejected answer for {:?}: {}", field.label, error);
                prompter.reject(field, &error);
            }
        }
    }
}

/// Values supplied by the operator during provisioning.
#[derive(Clone, PartialEq, Eq)]
pub struct OperatorParameters {
    /// Telegram API id.
    pub api_id: u64,

    /// Telegram API hash.
    pub api_hash: String,

    /// Chat that receives lead notifications (negative for groups).
    pub target_telegram_id: i64,

    /// Session label handed to the bot.
    pub session_name: String,
}

impl fmt::Debug for OperatorParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorParameters")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("target_telegram_id", &self.target_telegram_id)
            .field("session_name", &self.session_name)
            .finish()
    }
}

/// Asks for every operator parameter in order.
///
/// # Errors
///
/// Returns an error if the prompter fails.
pub fn collect_parameters<P>(
    prompter: &mut P,
    default_session: &str,
) -> Result<OperatorParameters, PromptError>
where
    P: Prompter + ?Sized,
{
    let api_id = ask_until_valid(
        prompter,
        &Field::text("Telegram API_ID (digits only)"),
        validate::unsigned_id,
    )?;

    let api_hash = ask_until_valid(
        prompter,
        &Field::hidden("Telegram API_HASH"),
        validate::secret,
    )?;

    let target_telegram_id = ask_until_valid(
        prompter,
        &Field::text("Telegram ID that receives lead notifications (negative for groups)"),
        validate::signed_id,
    )?;

    let session_name = ask_until_valid(
        prompter,
        &Field::text(format!("Session name [{default_session}]")),
        |raw| validate::label_or_default(raw, default_session),
    )?;

    Ok(OperatorParameters {
        api_id,
        api_hash,
        target_telegram_id,
        session_name,
    })
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedPrompter;
    use super::*;

    #[test]
    fn test_reprompts_until_digits() {
        let mut prompter = ScriptedPrompter::new(["12a", "34"]);
        let value =
            ask_until_valid(&mut prompter, &Field::text("API_ID"), validate::unsigned_id).unwrap();

        assert_eq!(value, 34);
        assert_eq!(prompter.asked.len(), 2);
        assert_eq!(prompter.rejections, vec![InputError::NotDigits]);
    }

    #[test]
    fn test_signed_prompt_skips_decimal() {
        let mut prompter = ScriptedPrompter::new(["12.5", "-100200300"]);
        let value =
            ask_until_valid(&mut prompter, &Field::text("target"), validate::signed_id).unwrap();
        assert_eq!(value, -100_200_300);
        assert_eq!(prompter.rejections, vec![InputError::NotSignedDigits]);
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let mut prompter = ScriptedPrompter::new(["nope"]);
        let result = ask_until_valid(&mut prompter, &Field::text("API_ID"), validate::unsigned_id);
        assert!(matches!(result, Err(PromptError::Closed { .. })));
    }

    #[test]
    fn test_collect_parameters() {
        let mut prompter = ScriptedPrompter::new(["", "12345", "", "abcdef0123", "-100200300", ""]);
        let params = collect_parameters(&mut prompter, "userbot_session").unwrap();

        assert_eq!(params.api_id, 12345);
        assert_eq!(params.api_hash, "abcdef0123");
        assert_eq!(params.target_telegram_id, -100_200_300);
        assert_eq!(params.session_name, "userbot_session");
        assert_eq!(prompter.rejections, vec![InputError::Empty, InputError::Empty]);
        assert!(prompter.asked[2].hidden);
    }

    #[test]
    fn test_parameters_debug_hides_hash() {
        let params = OperatorParameters {
            api_id: 1,
            api_hash: "topsecret".to_owned(),
            target_telegram_id: 2,
            session_name: "s".to_owned(),
        };
        assert!(!format!("{params:?}").contains("topsecret"));
    }
}
