//! OS package installation.

use std::time::Duration;

use crate::error::AgentError;
use crate::executor::CommandSpec;
use crate::platform::OsFamily;

/// Build the non-interactive install command for `packages`.
///
/// Both package managers treat already-installed packages as success, so
/// the command is safe to repeat.
pub fn install_command(
    os_family: OsFamily,
    packages: &[String],
    timeout: Duration,
) -> Result<CommandSpec, AgentError> {
    if packages.is_empty() {
        return Err(AgentError::invalid_parameter(
            "packages",
            "at least one package is required",
        ));
    }

    let spec = match os_family {
        OsFamily::RedHatFamily => CommandSpec::new("yum").args(["install", "-y"]),
        OsFamily::UbuntuFamily => CommandSpec::new("apt-get")
            .args([
                "install",
                "-y",
                "-o",
                "Dpkg::Options::=--force-confdef",
                "-o",
                "Dpkg::Options::=--force-confold",
            ])
            .env("DEBIAN_FRONTEND", "noninteractive"),
        OsFamily::Other => {
            return Err(AgentError::invalid_parameter(
                "os_family",
                "no package manager known for this OS family; set platform.os_family",
            ))
        }
    };

    Ok(spec.args(packages).timeout(timeout))
}
