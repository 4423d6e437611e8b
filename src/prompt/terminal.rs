//! Interactive prompts on the operator's terminal.

use dialoguer::{Input, Password};

use super::{Field, InputError, PromptError, Prompter};

/// Reads answers with `dialoguer`; hidden fields are entered without echo.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Creates a terminal prompter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn read(&mut self, field: &Field) -> Result<String, PromptError> {
        let answer = if field.hidden {
            Password::new()
                .with_prompt(&field.label)
                .allow_empty_password(true)
                .interact()?
        } else {
            Input::<String>::new()
                .with_prompt(&field.label)
                .allow_empty(true)
                .interact_text()?
        };
        Ok(answer)
    }

    fn reject(&mut self, field: &Field, error: &InputError) {
        eprintln!("✗ {}: {error}. Please try again.", field.label);
    }
}
