//! Error types for the management-pack agent.

use std::path::PathBuf;
use thiserror::Error;

use crate::executor::sanitize_output;

/// Main error type for the agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Failure to run an external command at all (spawn, wait, timeout).
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// An external command ran but returned a code the caller does not accept.
    #[error(
        "Execution of '{command}' returned {return_code}: {}",
        sanitize_output(.stderr, 5)
    )]
    ExecutionFailed {
        command: String,
        return_code: i32,
        stdout: String,
        stderr: String,
    },

    /// A materialization target could not be created or written.
    #[error("I/O failure on '{}': {source}", .path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An expected local file is absent.
    #[error("Missing resource: {}", .path.display())]
    MissingResource { path: PathBuf },

    /// Template-related errors.
    #[error("Template error: {message}")]
    Template { message: String },

    /// A lifecycle verb was invoked from a state that does not allow it.
    #[error("Cannot {verb} service '{service}' while it is {state}")]
    InvalidTransition {
        service: String,
        verb: &'static str,
        state: String,
    },

    /// Search index endpoint errors.
    #[error("Index error: {message}")]
    Index { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Unknown service: {service}")]
    UnknownService { service: String },

    #[error("Unknown verb: {verb}")]
    UnknownVerb { verb: String },

    #[error("Unknown user: {user}")]
    UnknownUser { user: String },

    #[error("Unknown group: {group}")]
    UnknownGroup { group: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Failed to spawn {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("Command execution failed: {message}")]
    WaitFailed { message: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl AgentError {
    /// Shorthand for an I/O failure on a materialization target.
    pub fn materialize(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AgentError::Materialize {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for an invalid parameter validation error.
    pub fn invalid_parameter(param: &str, message: impl Into<String>) -> Self {
        AgentError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: param.to_string(),
                message: message.into(),
            },
        }
    }

    /// Return code carried by an execution failure, if this is one.
    pub fn return_code(&self) -> Option<i32> {
        match self {
            AgentError::ExecutionFailed { return_code, .. } => Some(*return_code),
            _ => None,
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
