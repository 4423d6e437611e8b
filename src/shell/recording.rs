//! In-memory shell for tests.

use std::cell::RefCell;

use super::{Completed, Invocation, Shell, ShellError};

type Matcher = Box<dyn Fn(&Invocation) -> bool>;

/// Records every invocation and answers from a list of canned responses.
///
/// Invocations without a matching response succeed with empty output.
/// Programs registered as missing fail to spawn with `NotFound`.
#[derive(Default)]
pub struct RecordingShell {
    calls: RefCell<Vec<Invocation>>,
    responses: Vec<(Matcher, Completed)>,
    missing: Vec<String>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers invocations accepted by `matcher` with `response`.
    pub fn respond(
        mut self,
        matcher: impl Fn(&Invocation) -> bool + 'static,
        response: Completed,
    ) -> Self {
        self.responses.push((Box::new(matcher), response));
        self
    }

    /// Makes `program` behave as if it were not installed.
    pub fn without(mut self, program: &str) -> Self {
        self.missing.push(program.to_owned());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Every recorded invocation rendered as a command line.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.command_lines().iter().any(|line| line.contains(needle))
    }
}

impl Shell for RecordingShell {
    async fn run(&self, invocation: &Invocation) -> Result<Completed, ShellError> {
        self.calls.borrow_mut().push(invocation.clone());

        if self.missing.iter().any(|p| *p == invocation.program) {
            return Err(ShellError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        Ok(self
            .responses
            .iter()
            .find(|(matcher, _)| matcher(invocation))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Completed::ok("")))
    }
}
