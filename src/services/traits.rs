//! Service definition traits.
//!
//! Defines the interface for manageable services.

use std::time::Duration;

use crate::error::AgentError;
use crate::executor::CommandSpec;
use crate::materialize::{DirectorySpec, FileSpec};
use crate::platform::PlatformFacts;
use crate::status::StatusCodeTable;

/// Static metadata identifying a managed service's commands and identity.
///
/// Immutable for the lifetime of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    /// Service identifier (e.g., "elasticsearch", "kibana").
    pub name: String,
    /// Human-readable name used in log events.
    pub display_name: String,
    /// Account the service runs as.
    pub user: String,
    pub group: String,
    /// OS packages providing the service.
    pub packages: Vec<String>,
    pub start: CommandSpec,
    pub stop: CommandSpec,
    pub restart: CommandSpec,
    pub status: CommandSpec,
    /// Return-code interpretation for `status`.
    pub status_codes: StatusCodeTable,
}

impl ServiceDescriptor {
    /// A descriptor driven through an LSB init script:
    /// `service <init_script> {start|stop|restart|status}`.
    ///
    /// The status check runs as `status_user` when given.
    #[allow(clippy::too_many_arguments)]
    pub fn lsb(
        name: &str,
        display_name: &str,
        init_script: &str,
        user: &str,
        group: &str,
        packages: &[String],
        status_user: Option<&str>,
        timeout: Duration,
    ) -> Self {
        let command = |action: &str| CommandSpec::service(init_script, action).timeout(timeout);
        let status = match status_user {
            Some(status_user) => command("status").as_user(status_user),
            None => command("status"),
        };

        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            user: user.to_string(),
            group: group.to_string(),
            packages: packages.to_vec(),
            start: command("start"),
            stop: command("stop"),
            restart: command("restart"),
            status,
            status_codes: StatusCodeTable::lsb(),
        }
    }
}

/// Directories and files a service needs on disk, in application order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayout {
    pub directories: Vec<DirectorySpec>,
    pub files: Vec<FileSpec>,
}

/// A system account the service must run as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub user: String,
    pub group: String,
}

/// Defines a manageable service.
///
/// Implementations describe what a service looks like on disk; the
/// lifecycle controller decides when to apply it.
pub trait ManagedService: Send + Sync {
    /// Identity and control commands.
    fn descriptor(&self) -> &ServiceDescriptor;

    /// Directory and file specs for this host.
    ///
    /// Directories are listed before the files placed inside them.
    fn layout(&self, facts: &PlatformFacts) -> Result<ConfigLayout, AgentError>;

    /// Account that must exist before configuration is written.
    fn account(&self) -> Option<ServiceAccount> {
        None
    }

    /// Commands to run after configuration has been written.
    fn post_configure(&self, _facts: &PlatformFacts) -> Vec<CommandSpec> {
        Vec::new()
    }
}
