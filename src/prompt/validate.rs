//! Validators for operator input.
//!
//! Each validator turns raw terminal input into a typed value or an
//! [`InputError`] that the prompt loop shows before asking again.

use thiserror::Error;

use crate::config::is_shell_safe;

/// Reasons an answer is rejected. All of them lead to a re-prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("A value is required")]
    Empty,

    #[error("Only digits 0-9 are allowed")]
    NotDigits,

    #[error("Only an optional leading '-' followed by digits 0-9 is allowed")]
    NotSignedDigits,

    #[error("The number is too large")]
    OutOfRange,

    #[error("Only letters, digits and _ @ % + = : , . / - are allowed")]
    UnsafeCharacters,
}

/// Accepts `^[0-9]+$` (surrounding whitespace ignored).
pub fn unsigned_id(raw: &str) -> Result<u64, InputError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(InputError::Empty);
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(InputError::NotDigits);
    }
    value.parse().map_err(|_| InputError::OutOfRange)
}

/// Accepts `^-?[0-9]+$` (surrounding whitespace ignored).
pub fn signed_id(raw: &str) -> Result<i64, InputError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(InputError::Empty);
    }
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(InputError::NotSignedDigits);
    }
    value.parse().map_err(|_| InputError::OutOfRange)
}

/// Accepts any non-empty secret made of shell-safe characters.
pub fn secret(raw: &str) -> Result<String, InputError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(InputError::Empty);
    }
    if !is_shell_safe(value) {
        return Err(InputError::UnsafeCharacters);
    }
    Ok(value.to_owned())
}

/// Returns `default` for empty input, otherwise the shell-safe label.
pub fn label_or_default(raw: &str, default: &str) -> Result<String, InputError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(default.to_owned());
    }
    if !is_shell_safe(value) {
        return Err(InputError::UnsafeCharacters);
    }
    Ok(value.to_owned())
}
