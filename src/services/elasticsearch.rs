//! Elasticsearch service definition.

use std::path::PathBuf;

use crate::config::{ElasticsearchConfig, Settings};
use crate::error::AgentError;
use crate::executor::CommandSpec;
use crate::materialize::{parse_mode, ContentSource, DirectorySpec, FileSpec};
use crate::platform::{resolve_env_path, PlatformFacts};

use super::traits::{ConfigLayout, ManagedService, ServiceAccount, ServiceDescriptor};

/// Named template for `elasticsearch.yml`.
pub const SITE_TEMPLATE: &str = "elasticsearch/elasticsearch.yml.tera";

/// Named template for the PAM limits file.
pub const LIMITS_TEMPLATE: &str = "elasticsearch/limits.conf.tera";

/// Elasticsearch search engine service.
pub struct ElasticsearchService {
    config: ElasticsearchConfig,
    env_file_default: PathBuf,
    descriptor: ServiceDescriptor,
}

impl ElasticsearchService {
    pub fn new(settings: &Settings) -> Self {
        let config = settings.elasticsearch.clone();
        let descriptor = ServiceDescriptor::lsb(
            "elasticsearch",
            "Elasticsearch",
            &config.service_name,
            &config.user,
            &config.group,
            &config.packages,
            None,
            settings.limits.command_timeout(),
        );

        Self {
            config,
            env_file_default: settings.platform.env_file_default.clone(),
            descriptor,
        }
    }

    /// Template context shared by every Elasticsearch file.
    fn context(&self) -> Result<serde_json::Value, AgentError> {
        let mut context = serde_json::to_value(&self.config)?;
        context["configurations"] = serde_json::to_value(&self.config.site)?;
        context["data_paths"] = serde_json::to_value(self.config.data_paths())?;
        Ok(context)
    }
}

impl ManagedService for ElasticsearchService {
    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    fn layout(&self, facts: &PlatformFacts) -> Result<ConfigLayout, AgentError> {
        let cfg = &self.config;
        let mode = parse_mode(&cfg.directory_mode)?;
        let context = self.context()?;
        let (sys_owner, sys_group) = (cfg.system_owner.as_str(), cfg.system_group.as_str());

        let owned_dir = |path: PathBuf| {
            DirectorySpec::new(path)
                .owned_by(&cfg.user, &cfg.group)
                .mode(mode)
        };

        let mut directories = vec![
            owned_dir(cfg.log_dir.clone()),
            owned_dir(cfg.pid_dir.clone()),
            owned_dir(cfg.conf_dir.clone()),
        ];
        directories.extend(cfg.data_paths().into_iter().map(owned_dir));
        directories.push(owned_dir(cfg.conf_dir.join("scripts")));
        // Some distributions ship without limits.d
        directories.push(
            DirectorySpec::new(cfg.limits_conf_dir.clone()).owned_by(sys_owner, sys_group),
        );

        let env_path = resolve_env_path(facts.os_family, &self.env_file_default);

        let mut files = vec![
            FileSpec::new(
                cfg.conf_dir.join("elastic-env.sh"),
                ContentSource::inline(&cfg.env_sh_template, context.clone()),
            )
            .owned_by(&cfg.user, &cfg.group),
            FileSpec::new(
                cfg.conf_dir.join("elasticsearch.yml"),
                ContentSource::template(SITE_TEMPLATE, context.clone()),
            )
            .owned_by(&cfg.user, &cfg.group),
            FileSpec::new(
                env_path,
                ContentSource::inline(&cfg.sysconfig_template, context.clone()),
            )
            .owned_by(sys_owner, sys_group),
            FileSpec::new(
                cfg.limits_conf_file.clone(),
                ContentSource::template(LIMITS_TEMPLATE, context.clone()),
            )
            .owned_by(sys_owner, sys_group),
        ];

        // Under systemd the PAM limits are not applied to the service;
        // they must be repeated in a unit override.
        if facts.systemd {
            directories.push(
                DirectorySpec::new(cfg.systemd_dir.clone()).owned_by(sys_owner, sys_group),
            );
            files.push(
                FileSpec::new(
                    cfg.systemd_override_file.clone(),
                    ContentSource::inline(&cfg.systemd_override_template, context),
                )
                .owned_by(sys_owner, sys_group),
            );
        }

        Ok(ConfigLayout { directories, files })
    }

    fn account(&self) -> Option<ServiceAccount> {
        Some(ServiceAccount {
            user: self.config.user.clone(),
            group: self.config.group.clone(),
        })
    }

    fn post_configure(&self, facts: &PlatformFacts) -> Vec<CommandSpec> {
        if facts.systemd {
            vec![CommandSpec::new("systemctl").arg("daemon-reload")]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OsFamily;

    fn service() -> ElasticsearchService {
        let settings = Settings::from_toml(
            r#"
            [elasticsearch]
            path_data = "/data1/es, /data2/es"

            [elasticsearch.site]
            "cluster.name" = "metron"
            "#,
        )
        .unwrap();
        ElasticsearchService::new(&settings)
    }

    fn facts(os_family: OsFamily, systemd: bool) -> PlatformFacts {
        PlatformFacts { os_family, systemd }
    }

    fn paths<T>(items: &[T], path: impl Fn(&T) -> &std::path::Path) -> Vec<String> {
        items.iter().map(|i| path(i).display().to_string()).collect()
    }

    #[test]
    fn test_descriptor() {
        let service = service();
        let descriptor = service.descriptor();
        assert_eq!(descriptor.name, "elasticsearch");
        assert_eq!(descriptor.start.display(), "service elasticsearch start");
        assert_eq!(descriptor.status.display(), "service elasticsearch status");
        assert_eq!(descriptor.packages, vec!["elasticsearch".to_string()]);
        assert_eq!(
            service.account(),
            Some(ServiceAccount {
                user: "elasticsearch".to_string(),
                group: "elasticsearch".to_string(),
            })
        );
    }

    #[test]
    fn test_layout_directories() {
        let layout = service()
            .layout(&facts(OsFamily::RedHatFamily, false))
            .unwrap();
        assert_eq!(
            paths(&layout.directories, |d| d.path.as_path()),
            vec![
                "/var/log/elasticsearch",
                "/var/run/elasticsearch",
                "/etc/elasticsearch",
                "/data1/es",
                "/data2/es",
                "/etc/elasticsearch/scripts",
                "/etc/security/limits.d",
            ]
        );
        let data = &layout.directories[3];
        assert_eq!(data.owner.as_deref(), Some("elasticsearch"));
        assert_eq!(data.mode, Some(0o755));
        assert!(data.create_parents);
        assert_eq!(layout.directories[6].owner.as_deref(), Some("root"));
    }

    #[test]
    fn test_layout_env_file_follows_os_family() {
        let redhat = service()
            .layout(&facts(OsFamily::RedHatFamily, false))
            .unwrap();
        assert!(paths(&redhat.files, |f| f.path.as_path())
            .contains(&"/etc/sysconfig/elasticsearch".to_string()));

        let ubuntu = service()
            .layout(&facts(OsFamily::UbuntuFamily, false))
            .unwrap();
        assert!(paths(&ubuntu.files, |f| f.path.as_path())
            .contains(&"/etc/default/elasticsearch".to_string()));
    }

    #[test]
    fn test_layout_files_without_systemd() {
        let service = service();
        let layout = service
            .layout(&facts(OsFamily::UbuntuFamily, false))
            .unwrap();
        assert_eq!(
            paths(&layout.files, |f| f.path.as_path()),
            vec![
                "/etc/elasticsearch/elastic-env.sh",
                "/etc/elasticsearch/elasticsearch.yml",
                "/etc/default/elasticsearch",
                "/etc/security/limits.d/elasticsearch.conf",
            ]
        );
        assert!(service
            .post_configure(&facts(OsFamily::UbuntuFamily, false))
            .is_empty());
    }

    #[test]
    fn test_layout_with_systemd_adds_override_and_reload() {
        let service = service();
        let systemd = facts(OsFamily::RedHatFamily, true);
        let layout = service.layout(&systemd).unwrap();

        assert_eq!(
            layout.directories.last().unwrap().path,
            PathBuf::from("/etc/systemd/system/elasticsearch.service.d")
        );
        assert_eq!(
            layout.files.last().unwrap().path,
            PathBuf::from("/etc/systemd/system/elasticsearch.service.d/override.conf")
        );
        let post: Vec<String> = service
            .post_configure(&systemd)
            .iter()
            .map(|c| c.display())
            .collect();
        assert_eq!(post, vec!["systemctl daemon-reload".to_string()]);
    }

    #[test]
    fn test_site_template_context() {
        let layout = service()
            .layout(&facts(OsFamily::RedHatFamily, false))
            .unwrap();
        match &layout.files[1].content {
            ContentSource::Template { name, params } => {
                assert_eq!(name, SITE_TEMPLATE);
                assert_eq!(params["configurations"]["cluster.name"], "metron");
                assert_eq!(params["data_paths"][1], "/data2/es");
                assert_eq!(params["user"], "elasticsearch");
            }
            other => panic!("unexpected content source: {:?}", other),
        }
    }
}
