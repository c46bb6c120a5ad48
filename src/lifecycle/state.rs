//! Lifecycle states and verbs.

use std::fmt;
use std::str::FromStr;

use crate::error::{AgentError, ValidationErrorKind};

/// Where a service is in its lifecycle, as far as this invocation knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotInstalled,
    Installed,
    Configured,
    Running,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::NotInstalled => "not installed",
            LifecycleState::Installed => "installed",
            LifecycleState::Configured => "configured",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// An operation requested on a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Install,
    Configure,
    Start,
    Stop,
    Restart,
    Status,
    LoadTemplate,
}

impl Verb {
    pub const ALL: [Verb; 7] = [
        Verb::Install,
        Verb::Configure,
        Verb::Start,
        Verb::Stop,
        Verb::Restart,
        Verb::Status,
        Verb::LoadTemplate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Install => "install",
            Verb::Configure => "configure",
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Status => "status",
            Verb::LoadTemplate => "load-template",
        }
    }

    /// Whether this verb may be issued from `state`.
    pub fn allowed_from(&self, state: LifecycleState) -> bool {
        use LifecycleState::*;
        match self {
            Verb::Install => matches!(state, NotInstalled | Installed),
            Verb::Start | Verb::Stop | Verb::Restart => state != NotInstalled,
            Verb::Configure | Verb::Status | Verb::LoadTemplate => true,
        }
    }

    /// State after the verb succeeds; `None` leaves the state unchanged.
    pub fn target(&self) -> Option<LifecycleState> {
        match self {
            Verb::Install => Some(LifecycleState::Installed),
            Verb::Configure => Some(LifecycleState::Configured),
            Verb::Start | Verb::Restart => Some(LifecycleState::Running),
            Verb::Stop => Some(LifecycleState::Stopped),
            Verb::Status | Verb::LoadTemplate => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .iter()
            .copied()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| AgentError::Validation {
                kind: ValidationErrorKind::UnknownVerb {
                    verb: s.to_string(),
                },
            })
    }
}
