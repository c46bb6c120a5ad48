//! Configuration settings for the agent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::materialize::parse_mode;
use crate::platform::OsFamilySetting;

/// Default location of the agent configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mpack-agent/agent.toml";

/// Main configuration structure for the agent.
///
/// Every section is optional; missing values take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
    pub paths: PathsConfig,
    pub platform: PlatformConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub kibana: KibanaConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format ("pretty" or "json").
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Timeout for service control and status commands, in seconds.
    pub command_timeout_seconds: u64,
    /// Timeout for package installation, in seconds.
    pub package_timeout_seconds: u64,
    /// Timeout for requests to the search index endpoint, in seconds.
    pub http_timeout_seconds: u64,
}

/// Paths configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory containing the bundled `.tera` templates.
    pub templates_dir: PathBuf,
}

/// Platform configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// OS family override; `auto` reads /etc/os-release.
    pub os_family: OsFamilySetting,
    /// Environment file used when the OS family is not recognized.
    pub env_file_default: PathBuf,
}

/// Elasticsearch service parameters.
///
/// Serialized as-is into the template context of every Elasticsearch file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Init script name used with `service <name> <action>`.
    pub service_name: String,
    pub user: String,
    pub group: String,
    /// Owner of host-wide files (environment file, PAM limits, systemd unit override).
    pub system_owner: String,
    pub system_group: String,
    pub packages: Vec<String>,
    pub conf_dir: PathBuf,
    pub log_dir: PathBuf,
    pub pid_dir: PathBuf,
    /// Comma-separated data directories, as written in `path.data`.
    pub path_data: String,
    /// Octal mode for service-owned directories.
    pub directory_mode: String,
    pub heap_size: String,
    pub max_open_files: u64,
    pub limits_conf_dir: PathBuf,
    pub limits_conf_file: PathBuf,
    pub systemd_dir: PathBuf,
    pub systemd_override_file: PathBuf,
    pub env_sh_template: String,
    pub sysconfig_template: String,
    pub systemd_override_template: String,
    /// Free-form `elasticsearch.yml` settings.
    pub site: BTreeMap<String, serde_json::Value>,
}

/// Kibana service parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KibanaConfig {
    pub service_name: String,
    pub user: String,
    pub group: String,
    pub packages: Vec<String>,
    pub conf_dir: PathBuf,
    pub log_dir: PathBuf,
    pub pid_dir: PathBuf,
    pub directory_mode: String,
    pub server_host: String,
    pub server_port: u16,
    /// Search index endpoint host.
    pub es_host: String,
    /// Search index endpoint port.
    pub es_port: u16,
    /// Serialized dashboard definition loaded by `load-template`.
    pub dashboard_file: PathBuf,
    pub yml_template: String,
    pub site: BTreeMap<String, serde_json::Value>,
}

fn default_env_sh_template() -> String {
    r#"#!/bin/bash
# Elasticsearch environment. Managed by mpack-agent; local edits are overwritten.
export ES_PATH_CONF="{{ conf_dir }}"
export ES_JAVA_OPTS="-Xms{{ heap_size }} -Xmx{{ heap_size }}"
export MAX_OPEN_FILES={{ max_open_files }}
"#
    .to_string()
}

fn default_sysconfig_template() -> String {
    r#"# Managed by mpack-agent; local edits are overwritten.
ES_HOME=/usr/share/elasticsearch
CONF_DIR={{ conf_dir }}
ES_PATH_CONF={{ conf_dir }}
DATA_DIR={{ path_data }}
LOG_DIR={{ log_dir }}
PID_DIR={{ pid_dir }}
ES_JAVA_OPTS="-Xms{{ heap_size }} -Xmx{{ heap_size }}"
ES_USER={{ user }}
ES_GROUP={{ group }}
MAX_OPEN_FILES={{ max_open_files }}
MAX_LOCKED_MEMORY=unlimited
"#
    .to_string()
}

fn default_systemd_override_template() -> String {
    r#"[Service]
LimitMEMLOCK=infinity
LimitNOFILE={{ max_open_files }}
"#
    .to_string()
}

fn default_kibana_yml_template() -> String {
    r#"# Managed by mpack-agent; local edits are overwritten.
server.port: {{ server_port }}
server.host: "{{ server_host }}"
elasticsearch.url: "http://{{ es_host }}:{{ es_port }}"
kibana.index: ".kibana"
pid.file: {{ pid_dir }}/kibana.pid
logging.dest: {{ log_dir }}/kibana.log
{% for key, value in site %}{{ key }}: {{ value }}
{% endfor %}"#
        .to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            command_timeout_seconds: 60,
            package_timeout_seconds: 600,
            http_timeout_seconds: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("/usr/share/mpack-agent/templates"),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            os_family: OsFamilySetting::Auto,
            env_file_default: PathBuf::from(crate::platform::DEFAULT_ENV_PATH),
        }
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            service_name: "elasticsearch".to_string(),
            user: "elasticsearch".to_string(),
            group: "elasticsearch".to_string(),
            system_owner: "root".to_string(),
            system_group: "root".to_string(),
            packages: vec!["elasticsearch".to_string()],
            conf_dir: PathBuf::from("/etc/elasticsearch"),
            log_dir: PathBuf::from("/var/log/elasticsearch"),
            pid_dir: PathBuf::from("/var/run/elasticsearch"),
            path_data: "/var/lib/elasticsearch".to_string(),
            directory_mode: "0755".to_string(),
            heap_size: "512m".to_string(),
            max_open_files: 65536,
            limits_conf_dir: PathBuf::from("/etc/security/limits.d"),
            limits_conf_file: PathBuf::from("/etc/security/limits.d/elasticsearch.conf"),
            systemd_dir: PathBuf::from("/etc/systemd/system/elasticsearch.service.d"),
            systemd_override_file: PathBuf::from(
                "/etc/systemd/system/elasticsearch.service.d/override.conf",
            ),
            env_sh_template: default_env_sh_template(),
            sysconfig_template: default_sysconfig_template(),
            systemd_override_template: default_systemd_override_template(),
            site: BTreeMap::new(),
        }
    }
}

impl Default for KibanaConfig {
    fn default() -> Self {
        Self {
            service_name: "kibana".to_string(),
            user: "kibana".to_string(),
            group: "kibana".to_string(),
            packages: vec!["kibana".to_string()],
            conf_dir: PathBuf::from("/etc/kibana"),
            log_dir: PathBuf::from("/var/log/kibana"),
            pid_dir: PathBuf::from("/var/run/kibana"),
            directory_mode: "0755".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 5601,
            es_host: "localhost".to_string(),
            es_port: 9200,
            dashboard_file: PathBuf::from("/usr/share/mpack-agent/dashboard/dashboard.json"),
            yml_template: default_kibana_yml_template(),
            site: BTreeMap::new(),
        }
    }
}

impl ElasticsearchConfig {
    /// Data directories from `path_data`.
    ///
    /// Quotes and spaces are stripped, empty entries dropped.
    pub fn data_paths(&self) -> Vec<PathBuf> {
        self.path_data
            .replace(['"', ' '], "")
            .split(',')
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

impl KibanaConfig {
    /// Base URL of the search index endpoint.
    pub fn index_url(&self) -> String {
        format!("http://{}:{}", self.es_host, self.es_port)
    }
}

impl LimitsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.package_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            AgentError::Config { message } => AgentError::Config {
                message: format!("{} (in '{}')", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, AgentError> {
        let settings: Settings = toml::from_str(content).map_err(|e| AgentError::Config {
            message: format!("Failed to parse configuration: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), AgentError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(AgentError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(AgentError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        for (section, mode) in [
            ("elasticsearch", &self.elasticsearch.directory_mode),
            ("kibana", &self.kibana.directory_mode),
        ] {
            parse_mode(mode).map_err(|_| AgentError::Config {
                message: format!(
                    "Invalid {}.directory_mode '{}'. Must be octal (e.g., '0755')",
                    section, mode
                ),
            })?;
        }

        for (key, value) in [
            ("elasticsearch.user", &self.elasticsearch.user),
            ("elasticsearch.group", &self.elasticsearch.group),
            ("elasticsearch.system_owner", &self.elasticsearch.system_owner),
            ("elasticsearch.system_group", &self.elasticsearch.system_group),
            ("kibana.user", &self.kibana.user),
            ("kibana.group", &self.kibana.group),
        ] {
            if value.trim().is_empty() {
                return Err(AgentError::Config {
                    message: format!("'{}' cannot be empty", key),
                });
            }
        }

        if self.elasticsearch.data_paths().is_empty() {
            return Err(AgentError::Config {
                message: "'elasticsearch.path_data' lists no directories".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, "pretty");
        assert_eq!(settings.elasticsearch.user, "elasticsearch");
        assert_eq!(settings.elasticsearch.system_owner, "root");
        assert_eq!(settings.elasticsearch.system_group, "root");
        assert_eq!(settings.kibana.es_port, 9200);
        assert_eq!(settings.limits.command_timeout(), Duration::from_secs(60));
        assert_eq!(settings.platform.os_family, OsFamilySetting::Auto);
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
            [logging]
            format = "json"

            [platform]
            os_family = "redhat"

            [elasticsearch]
            user = "elastic"
            path_data = '"/data1/es", "/data2/es"'

            [elasticsearch.site]
            "cluster.name" = "metron"
            "discovery.zen.minimum_master_nodes" = 1

            [kibana]
            es_host = "node1"
            "#,
        )
        .unwrap();

        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.platform.os_family, OsFamilySetting::Redhat);
        assert_eq!(settings.elasticsearch.user, "elastic");
        assert_eq!(settings.elasticsearch.group, "elasticsearch");
        assert_eq!(
            settings.elasticsearch.data_paths(),
            vec![PathBuf::from("/data1/es"), PathBuf::from("/data2/es")]
        );
        assert_eq!(settings.elasticsearch.site["cluster.name"], "metron");
        assert_eq!(settings.kibana.index_url(), "http://node1:9200");
    }

    #[test]
    fn test_invalid_log_level() {
        let err = Settings::from_toml("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, AgentError::Config { .. }));
    }

    #[test]
    fn test_invalid_directory_mode() {
        let err = Settings::from_toml("[kibana]\ndirectory_mode = \"rwx\"\n").unwrap_err();
        assert!(err.to_string().contains("kibana.directory_mode"));
    }

    #[test]
    fn test_empty_user_rejected() {
        assert!(Settings::from_toml("[elasticsearch]\nuser = \" \"\n").is_err());
    }

    #[test]
    fn test_empty_system_owner_rejected() {
        let err = Settings::from_toml("[elasticsearch]\nsystem_owner = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("elasticsearch.system_owner"));
    }

    #[test]
    fn test_empty_path_data_rejected() {
        assert!(Settings::from_toml("[elasticsearch]\npath_data = \" , \"\n").is_err());
    }

    #[test]
    fn test_unknown_os_family_rejected() {
        assert!(Settings::from_toml("[platform]\nos_family = \"beos\"\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/agent.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/agent.toml"));
    }
}
