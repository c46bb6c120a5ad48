//! Kibana service definition.

use std::path::PathBuf;

use crate::config::{KibanaConfig, Settings};
use crate::error::AgentError;
use crate::materialize::{parse_mode, ContentSource, DirectorySpec, FileSpec};
use crate::platform::PlatformFacts;

use super::traits::{ConfigLayout, ManagedService, ServiceDescriptor};

/// Kibana dashboard service.
pub struct KibanaService {
    config: KibanaConfig,
    descriptor: ServiceDescriptor,
}

impl KibanaService {
    pub fn new(settings: &Settings) -> Self {
        let config = settings.kibana.clone();
        let descriptor = ServiceDescriptor::lsb(
            "kibana",
            "Kibana",
            &config.service_name,
            &config.user,
            &config.group,
            &config.packages,
            Some(config.user.as_str()),
            settings.limits.command_timeout(),
        );

        Self { config, descriptor }
    }

    /// Serialized dashboard definition for `load-template`.
    pub fn dashboard_file(&self) -> &std::path::Path {
        &self.config.dashboard_file
    }

    /// Base URL of the search index endpoint.
    pub fn index_url(&self) -> String {
        self.config.index_url()
    }
}

impl ManagedService for KibanaService {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    fn layout(&self, _facts: &PlatformFacts) -> Result<ConfigLayout, AgentError> {
        let cfg = &self.config;
        let mode = parse_mode(&cfg.directory_mode)?;
        let context = serde_json::to_value(cfg)?;

        // Package install creates the parents; only the leaves are ours.
        let owned_dir = |path: &PathBuf| {
            DirectorySpec::new(path.clone())
                .owned_by(&cfg.user, &cfg.group)
                .mode(mode)
                .create_parents(false)
        };

        Ok(ConfigLayout {
            directories: vec![
                owned_dir(&cfg.log_dir),
                owned_dir(&cfg.pid_dir),
                owned_dir(&cfg.conf_dir),
            ],
            files: vec![FileSpec::new(
                cfg.conf_dir.join("kibana.yml"),
                ContentSource::inline(&cfg.yml_template, context),
            )
            .owner(&cfg.user)],
        })
    }
}
