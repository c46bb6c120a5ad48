//! Lifecycle controller for one managed service.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::LimitsConfig;
use crate::error::{AgentError, AgentResult};
use crate::executor::{CommandRunner, CommandSpec};
use crate::materialize::{MaterializeReport, Materializer};
use crate::platform::{OsFamily, PlatformFacts};
use crate::services::ManagedService;
use crate::status::{self, ServiceStatus};
use crate::system::{ensure_account, install_command};

use super::state::{LifecycleState, Verb};

/// Drives one service through install, configure and control verbs.
///
/// Every verb checks the transition before doing anything, so a rejected
/// verb has no side effects.
pub struct LifecycleController<R: CommandRunner> {
    service: Arc<dyn ManagedService>,
    runner: R,
    materializer: Materializer,
    os_family: OsFamily,
    limits: LimitsConfig,
    state: LifecycleState,
}

impl<R: CommandRunner> LifecycleController<R> {
    /// A controller for a service that is not installed yet.
    pub fn new(
        service: Arc<dyn ManagedService>,
        runner: R,
        materializer: Materializer,
        os_family: OsFamily,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            service,
            runner,
            materializer,
            os_family,
            limits,
            state: LifecycleState::NotInstalled,
        }
    }

    /// Seed the controller with a known starting state.
    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn name(&self) -> &str {
        &self.service.descriptor().name
    }

    fn check(&self, verb: Verb) -> AgentResult<()> {
        if verb.allowed_from(self.state) {
            return Ok(());
        }
        Err(AgentError::InvalidTransition {
            service: self.name().to_string(),
            verb: verb.as_str(),
            state: self.state.to_string(),
        })
    }

    fn advance(&mut self, verb: Verb) {
        if let Some(next) = verb.target() {
            debug!(service = %self.name(), from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    fn issue(&self, command: &CommandSpec) -> AgentResult<()> {
        self.runner.run_checked(command)?;
        Ok(())
    }

    /// Install the service's OS packages.
    pub fn install(&mut self) -> AgentResult<()> {
        self.check(Verb::Install)?;
        let descriptor = self.service.descriptor();
        info!(service = %descriptor.name, packages = ?descriptor.packages, "Installing");

        let command = install_command(
            self.os_family,
            &descriptor.packages,
            self.limits.package_timeout(),
        )?;
        self.issue(&command)?;

        self.advance(Verb::Install);
        Ok(())
    }

    /// Write the service's configuration to disk.
    pub fn configure(&mut self) -> AgentResult<MaterializeReport> {
        self.check(Verb::Configure)?;
        info!(service = %self.name(), "Configuring");

        if let Some(account) = self.service.account() {
            ensure_account(&self.runner, &account)?;
        }

        let facts = PlatformFacts::detect(self.os_family, &self.runner)?;
        let layout = self.service.layout(&facts)?;
        let report = self
            .materializer
            .materialize(&layout.directories, &layout.files)?;

        for command in self.service.post_configure(&facts) {
            self.issue(&command.timeout(self.limits.command_timeout()))?;
        }

        self.advance(Verb::Configure);
        Ok(report)
    }

    /// Configure, then start the service. Does not wait for it to come up.
    pub fn start(&mut self) -> AgentResult<()> {
        self.check(Verb::Start)?;
        self.configure()?;
        info!(service = %self.name(), "Starting");
        self.issue(&self.service.descriptor().start)?;
        self.advance(Verb::Start);
        Ok(())
    }

    pub fn stop(&mut self) -> AgentResult<()> {
        self.check(Verb::Stop)?;
        info!(service = %self.name(), "Stopping");
        self.issue(&self.service.descriptor().stop)?;
        self.advance(Verb::Stop);
        Ok(())
    }

    /// Configure, then restart the service.
    pub fn restart(&mut self) -> AgentResult<()> {
        self.check(Verb::Restart)?;
        self.configure()?;
        info!(service = %self.name(), "Restarting");
        self.issue(&self.service.descriptor().restart)?;
        self.advance(Verb::Restart);
        Ok(())
    }

    /// Query the service's status. Never changes the lifecycle state.
    ///
    /// A stopped service is an ordinary [`ServiceStatus::NotRunning`];
    /// only unrecognized return codes are errors.
    pub fn status(&self) -> AgentResult<ServiceStatus> {
        self.check(Verb::Status)?;
        let descriptor = self.service.descriptor();
        let result = self.runner.run(&descriptor.status)?;
        status::check(
            &descriptor.status_codes,
            &descriptor.display_name,
            &descriptor.status.display(),
            result,
        )
    }
}
