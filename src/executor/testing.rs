//! Scripted command runner for unit tests.

use std::cell::RefCell;

use super::{CommandRunner, CommandSpec, ExecResult};
use crate::error::{AgentError, AgentResult, CommandErrorKind};

/// Records every command and answers from a script keyed by command line.
///
/// Unscripted commands succeed with empty output.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    script: Vec<(String, ExecResult)>,
    missing: Vec<String>,
    hanging: Vec<String>,
    calls: RefCell<Vec<CommandSpec>>,
    observer: Option<Box<dyn Fn(&CommandSpec)>>,
}

impl RecordingRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer `command_line` with `result`.
    pub(crate) fn with(mut self, command_line: &str, result: ExecResult) -> Self {
        self.script.push((command_line.to_string(), result));
        self
    }

    /// Fail to spawn `program`, as if it were not installed.
    pub(crate) fn without_program(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    /// Report a timeout for every run of `program`.
    pub(crate) fn timing_out(mut self, program: &str) -> Self {
        self.hanging.push(program.to_string());
        self
    }

    /// Call `observer` for every command before answering it.
    pub(crate) fn observe(mut self, observer: impl Fn(&CommandSpec) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Command lines run so far, in order.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(CommandSpec::display).collect()
    }

    /// Recorded command specs, in order.
    pub(crate) fn specs(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> AgentResult<ExecResult> {
        if let Some(observer) = &self.observer {
            observer(spec);
        }
        self.calls.borrow_mut().push(spec.clone());
        if self.missing.iter().any(|p| p == spec.program()) {
            return Err(AgentError::Command {
                kind: CommandErrorKind::SpawnFailed {
                    program: spec.program().to_string(),
                    message: "No such file or directory (os error 2)".to_string(),
                },
            });
        }
        if self.hanging.iter().any(|p| p == spec.program()) {
            return Err(AgentError::Command {
                kind: CommandErrorKind::Timeout {
                    timeout_secs: spec.configured_timeout().as_secs(),
                },
            });
        }
        let line = spec.display();
        Ok(self
            .script
            .iter()
            .find(|(key, _)| *key == line)
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| ExecResult::new(0, "", "")))
    }
}
