//! Platform conventions.
//!
//! OS family detection and the filesystem paths that differ between
//! distribution families.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AgentError, CommandErrorKind};
use crate::executor::{CommandRunner, CommandSpec};

/// Environment file location on Red Hat family systems.
pub const REDHAT_ENV_PATH: &str = "/etc/sysconfig/elasticsearch";

/// Environment file location on Debian/Ubuntu family systems.
pub const UBUNTU_ENV_PATH: &str = "/etc/default/elasticsearch";

/// Fallback used when no explicit default is configured.
pub const DEFAULT_ENV_PATH: &str = UBUNTU_ENV_PATH;

const OS_RELEASE: &str = "/etc/os-release";

const REDHAT_IDS: &[&str] = &[
    "rhel", "centos", "fedora", "rocky", "almalinux", "amzn", "ol",
];
const UBUNTU_IDS: &[&str] = &["ubuntu", "debian"];

/// Distribution family of the local host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    RedHatFamily,
    UbuntuFamily,
    Other,
}

impl OsFamily {
    /// Detect the family from `/etc/os-release`.
    ///
    /// An unreadable file yields [`OsFamily::Other`].
    pub fn detect() -> Self {
        Self::detect_from(Path::new(OS_RELEASE))
    }

    /// Detect the family from an os-release style file.
    pub fn detect_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_os_release(&content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot read os-release");
                OsFamily::Other
            }
        }
    }

    /// Classify the contents of an os-release file by `ID` and `ID_LIKE`.
    pub fn from_os_release(content: &str) -> Self {
        let mut ids = Vec::new();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key.trim() == "ID" || key.trim() == "ID_LIKE" {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                ids.extend(value.split_whitespace().map(|s| s.to_ascii_lowercase()));
            }
        }

        if ids.iter().any(|id| REDHAT_IDS.contains(&id.as_str())) {
            OsFamily::RedHatFamily
        } else if ids.iter().any(|id| UBUNTU_IDS.contains(&id.as_str())) {
            OsFamily::UbuntuFamily
        } else {
            OsFamily::Other
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::RedHatFamily => write!(f, "redhat"),
            OsFamily::UbuntuFamily => write!(f, "ubuntu"),
            OsFamily::Other => write!(f, "other"),
        }
    }
}

/// The `platform.os_family` setting: a fixed family or auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamilySetting {
    #[default]
    Auto,
    Redhat,
    Ubuntu,
    Other,
}

impl OsFamilySetting {
    /// Resolve to a concrete family, detecting when set to `auto`.
    pub fn resolve(self) -> OsFamily {
        match self {
            OsFamilySetting::Auto => OsFamily::detect(),
            OsFamilySetting::Redhat => OsFamily::RedHatFamily,
            OsFamilySetting::Ubuntu => OsFamily::UbuntuFamily,
            OsFamilySetting::Other => OsFamily::Other,
        }
    }
}

impl FromStr for OsFamilySetting {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(OsFamilySetting::Auto),
            "redhat" => Ok(OsFamilySetting::Redhat),
            "ubuntu" => Ok(OsFamilySetting::Ubuntu),
            "other" => Ok(OsFamilySetting::Other),
            _ => Err(AgentError::invalid_parameter(
                "os_family",
                format!("'{}' is not one of auto, redhat, ubuntu, other", s),
            )),
        }
    }
}

/// Path of the service environment file for an OS family.
///
/// Unrecognized families fall back to `default` with a diagnostic.
pub fn resolve_env_path(family: OsFamily, default: &Path) -> PathBuf {
    match family {
        OsFamily::RedHatFamily => PathBuf::from(REDHAT_ENV_PATH),
        OsFamily::UbuntuFamily => PathBuf::from(UBUNTU_ENV_PATH),
        OsFamily::Other => {
            warn!(path = %default.display(), "Unexpected OS family; using default path");
            default.to_path_buf()
        }
    }
}

/// Host facts gathered once per configure run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformFacts {
    pub os_family: OsFamily,
    pub systemd: bool,
}

impl PlatformFacts {
    /// Check whether systemd is running on the host (`pidof systemd`).
    pub fn detect(
        os_family: OsFamily,
        runner: &dyn CommandRunner,
    ) -> Result<Self, AgentError> {
        let systemd = match runner.run(&CommandSpec::new("pidof").arg("systemd")) {
            Ok(result) => result.success(),
            // No pidof on the host: treat as no systemd
            Err(AgentError::Command {
                kind: CommandErrorKind::SpawnFailed { program, message },
            }) => {
                warn!(program = %program, error = %message, "pidof not available, assuming no systemd");
                false
            }
            Err(e) => return Err(e),
        };
        debug!(os_family = %os_family, systemd, "Platform detected");
        Ok(Self { os_family, systemd })
    }
}
