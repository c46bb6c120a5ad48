//! Service status interpretation.
//!
//! Status commands follow the LSB init-script convention for return codes:
//!
//! | code  | meaning                                   |
//! |-------|-------------------------------------------|
//! | 0     | program is running or service is OK       |
//! | 1     | program is dead and `/var/run` pid exists |
//! | 2     | program is dead and `/var/lock` exists    |
//! | 3     | program is not running                    |
//! | other | unknown, treated as an operational fault  |
//!
//! "Not running" is an ordinary poll result. Only codes outside the table
//! indicate a problem.

use std::fmt;

use tracing::{error, info};

use crate::error::AgentError;
use crate::executor::ExecResult;

/// Interpreted health of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    /// The service is running.
    Running,
    /// The service is confirmed absent (stopped or dead).
    NotRunning,
    /// The status command returned a code outside the table.
    UnknownFailure {
        code: i32,
        stdout: String,
        stderr: String,
    },
}

impl ServiceStatus {
    /// Whether this outcome is an operational fault rather than a health state.
    pub fn is_failure(&self) -> bool {
        matches!(self, ServiceStatus::UnknownFailure { .. })
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::NotRunning => write!(f, "not running"),
            ServiceStatus::UnknownFailure { code, .. } => write!(f, "unknown (code {})", code),
        }
    }
}

/// Mapping from status-command return codes to health states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeTable {
    running: Vec<i32>,
    not_running: Vec<i32>,
}

impl StatusCodeTable {
    /// The LSB table: `0` running, `1..=3` not running.
    pub fn lsb() -> Self {
        Self {
            running: vec![0],
            not_running: vec![1, 2, 3],
        }
    }

    /// Build a custom table. Codes listed as running take precedence.
    pub fn new(running: Vec<i32>, not_running: Vec<i32>) -> Self {
        Self {
            running,
            not_running,
        }
    }

    /// Interpret a bare return code, with no captured output.
    pub fn interpret_code(&self, code: i32) -> ServiceStatus {
        self.interpret(&ExecResult::new(code, "", ""))
    }

    /// Interpret the result of a status command.
    pub fn interpret(&self, result: &ExecResult) -> ServiceStatus {
        if self.running.contains(&result.return_code) {
            ServiceStatus::Running
        } else if self.not_running.contains(&result.return_code) {
            ServiceStatus::NotRunning
        } else {
            ServiceStatus::UnknownFailure {
                code: result.return_code,
                stdout: result.stdout.clone(),
                stderr: result.stderr.clone(),
            }
        }
    }
}

impl Default for StatusCodeTable {
    fn default() -> Self {
        Self::lsb()
    }
}

/// Interpret a status command result using the LSB table.
pub fn interpret(result: &ExecResult) -> ServiceStatus {
    StatusCodeTable::lsb().interpret(result)
}

/// Interpret and log a status result, converting unknown codes into an
/// execution failure.
///
/// `label` names the service in log events; `command` is the status
/// command line as executed.
pub fn check(
    table: &StatusCodeTable,
    label: &str,
    command: &str,
    result: ExecResult,
) -> Result<ServiceStatus, AgentError> {
    match table.interpret(&result) {
        ServiceStatus::Running => {
            info!(service = %label, "Service is running");
            Ok(ServiceStatus::Running)
        }
        ServiceStatus::NotRunning => {
            info!(
                service = %label,
                return_code = result.return_code,
                "Service is not running"
            );
            Ok(ServiceStatus::NotRunning)
        }
        ServiceStatus::UnknownFailure { code, stdout, stderr } => {
            error!(
                service = %label,
                command = %command,
                return_code = code,
                "Service check failed"
            );
            Err(AgentError::ExecutionFailed {
                command: command.to_string(),
                return_code: code,
                stdout,
                stderr,
            })
        }
    }
}
