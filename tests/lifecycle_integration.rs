//! Integration tests for the service lifecycle.
//!
//! These drive real services from the registry through the public API,
//! with a scripted command runner in place of the host and a temporary
//! directory in place of the filesystem layout.

use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::{getgid, getuid, Group, User};
use serde_json::json;
use tempfile::TempDir;

use mpack_agent::config::Settings;
use mpack_agent::dashboard::{load_dashboard, IndexClient, IndexResponse};
use mpack_agent::error::{AgentError, AgentResult};
use mpack_agent::executor::{CommandRunner, CommandSpec, ExecResult};
use mpack_agent::lifecycle::{LifecycleController, LifecycleState};
use mpack_agent::materialize::Materializer;
use mpack_agent::platform::{OsFamily, PlatformFacts};
use mpack_agent::services::{ManagedService, ServiceRegistry};
use mpack_agent::status::ServiceStatus;
use mpack_agent::templates::TemplateEngine;

/// Answers `service ... status` with a fixed code; everything else succeeds.
struct ScriptedHost {
    status_code: i32,
    log: RefCell<Vec<String>>,
}

impl ScriptedHost {
    fn new(status_code: i32) -> Self {
        Self {
            status_code,
            log: RefCell::new(Vec::new()),
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl CommandRunner for ScriptedHost {
    fn run(&self, spec: &CommandSpec) -> AgentResult<ExecResult> {
        let line = spec.display();
        self.log.borrow_mut().push(line.clone());
        if line.ends_with(" status") {
            Ok(ExecResult::new(self.status_code, "", "status stderr"))
        } else {
            Ok(ExecResult::new(0, "", ""))
        }
    }
}

fn bundled_templates() -> TemplateEngine {
    TemplateEngine::new(&PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates"))
        .expect("bundled templates load")
}

fn current_account() -> (String, String) {
    let user = User::from_uid(getuid()).unwrap().unwrap().name;
    let group = Group::from_gid(getgid()).unwrap().unwrap().name;
    (user, group)
}

fn settings(root: &Path) -> Settings {
    let (user, group) = current_account();
    Settings::from_toml(&format!(
        r#"
        [kibana]
        user = "{user}"
        group = "{group}"
        conf_dir = "{root}/kibana/conf"
        log_dir = "{root}/kibana/log"
        pid_dir = "{root}/kibana/run"
        dashboard_file = "{root}/dashboard.json"
        es_host = "search.internal"

        [elasticsearch]
        path_data = "\"/data/es1\", /data/es2"

        [elasticsearch.site]
        "cluster.name" = "metron"
        "network.host" = "0.0.0.0"
        "#,
        user = user,
        group = group,
        root = root.display(),
    ))
    .expect("test settings parse")
}

fn kibana_controller(
    settings: &Settings,
    host: ScriptedHost,
    state: LifecycleState,
) -> LifecycleController<ScriptedHost> {
    let registry = ServiceRegistry::new(settings);
    fs::create_dir_all(settings.kibana.conf_dir.parent().unwrap()).unwrap();
    LifecycleController::new(
        registry.get("kibana").unwrap(),
        host,
        Materializer::new(TemplateEngine::empty()),
        OsFamily::UbuntuFamily,
        settings.limits.clone(),
    )
    .with_state(state)
}

#[test]
fn test_bundled_templates_present() {
    let engine = bundled_templates();
    assert!(engine.has_template("elasticsearch/elasticsearch.yml.tera"));
    assert!(engine.has_template("elasticsearch/limits.conf.tera"));
}

#[test]
fn test_elasticsearch_site_rendering() {
    let tmp = TempDir::new().unwrap();
    let settings = settings(tmp.path());
    let registry = ServiceRegistry::new(&settings);
    let service = registry.get("elasticsearch").unwrap();

    let facts = PlatformFacts {
        os_family: OsFamily::RedHatFamily,
        systemd: true,
    };
    let layout = service.layout(&facts).unwrap();
    let materializer = Materializer::new(bundled_templates());

    let yml = layout
        .files
        .iter()
        .find(|f| f.path.ends_with("elasticsearch.yml"))
        .unwrap();
    let rendered = materializer.render(&yml.content).unwrap();
    assert!(rendered.contains("cluster.name: metron"));
    assert!(rendered.contains("network.host: 0.0.0.0"));
    assert!(rendered.contains("path.data: /data/es1,/data/es2"));
    assert!(rendered.contains("path.logs: /var/log/elasticsearch"));

    let limits = layout
        .files
        .iter()
        .find(|f| f.path.ends_with("elasticsearch.conf"))
        .unwrap();
    let rendered = materializer.render(&limits.content).unwrap();
    assert!(rendered.contains("elasticsearch - nofile 65536"));
    assert!(rendered.contains("elasticsearch - memlock unlimited"));

    let env_file = layout
        .files
        .iter()
        .find(|f| f.path == Path::new("/etc/sysconfig/elasticsearch"))
        .unwrap();
    assert!(materializer
        .render(&env_file.content)
        .unwrap()
        .contains("CONF_DIR=/etc/elasticsearch"));
}

#[test]
fn test_kibana_full_cycle() {
    let tmp = TempDir::new().unwrap();
    let settings = settings(tmp.path());
    let mut controller =
        kibana_controller(&settings, ScriptedHost::new(0), LifecycleState::NotInstalled);

    controller.install().unwrap();
    controller.start().unwrap();
    assert_eq!(controller.status().unwrap(), ServiceStatus::Running);
    controller.stop().unwrap();
    controller.restart().unwrap();
    assert_eq!(controller.state(), LifecycleState::Running);

    let yml = settings.kibana.conf_dir.join("kibana.yml");
    let content = fs::read_to_string(&yml).unwrap();
    assert!(content.contains("elasticsearch.url: \"http://search.internal:9200\""));

    let mode = fs::metadata(&settings.kibana.log_dir)
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o7777, 0o755);

    let log = controller.runner().log();
    assert!(log[0].starts_with("apt-get install"));
    assert_eq!(
        &log[1..],
        &[
            "pidof systemd",
            "service kibana start",
            "service kibana status",
            "service kibana stop",
            "pidof systemd",
            "service kibana restart",
        ]
    );
}

#[test]
fn test_status_not_running_and_failure() {
    let tmp = TempDir::new().unwrap();
    let settings = settings(tmp.path());

    let stopped = kibana_controller(&settings, ScriptedHost::new(3), LifecycleState::Installed);
    assert_eq!(stopped.status().unwrap(), ServiceStatus::NotRunning);

    let broken = kibana_controller(&settings, ScriptedHost::new(7), LifecycleState::Installed);
    match broken.status() {
        Err(AgentError::ExecutionFailed {
            return_code,
            stderr,
            ..
        }) => {
            assert_eq!(return_code, 7);
            assert_eq!(stderr, "status stderr");
        }
        other => panic!("unexpected status: {:?}", other),
    }
}

#[test]
fn test_configure_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let settings = settings(tmp.path());
    let mut controller =
        kibana_controller(&settings, ScriptedHost::new(0), LifecycleState::Installed);

    let first = controller.configure().unwrap();
    let yml = settings.kibana.conf_dir.join("kibana.yml");
    let before = fs::read(&yml).unwrap();

    let second = controller.configure().unwrap();
    assert_eq!(first.changed_files, vec![yml.clone()]);
    assert!(second.changed_files.is_empty());
    assert!(second.created_directories.is_empty());
    assert_eq!(fs::read(&yml).unwrap(), before);
}

struct RecordingIndex {
    calls: RefCell<Vec<String>>,
}

impl IndexClient for RecordingIndex {
    fn delete_index(&self, index: &str) -> AgentResult<IndexResponse> {
        self.calls.borrow_mut().push(format!("delete {}", index));
        Ok(IndexResponse::new(404, r#"{"error": "index_not_found_exception"}"#))
    }

    fn bulk(&self, body: String) -> AgentResult<IndexResponse> {
        self.calls
            .borrow_mut()
            .push(format!("bulk {}", body.lines().count()));
        Ok(IndexResponse::new(200, r#"{"errors": false, "items": []}"#))
    }
}

#[test]
fn test_load_template_from_configured_file() {
    let tmp = TempDir::new().unwrap();
    let settings = settings(tmp.path());
    let kibana = ServiceRegistry::new(&settings).kibana();
    let client = RecordingIndex {
        calls: RefCell::new(Vec::new()),
    };

    assert!(matches!(
        load_dashboard(&client, kibana.dashboard_file()),
        Err(AgentError::MissingResource { .. })
    ));
    assert!(client.calls.borrow().is_empty());

    let definition = json!([
        {"_type": "index-pattern", "_id": "yaf*", "_source": {"title": "yaf*"}},
        {"_type": "visualization", "_id": "events", "_source": {"title": "Events"}},
        {"_type": "dashboard", "_id": "Metron", "_source": {"title": "Metron"}}
    ]);
    fs::write(kibana.dashboard_file(), definition.to_string()).unwrap();

    assert_eq!(load_dashboard(&client, kibana.dashboard_file()).unwrap(), 3);
    assert_eq!(*client.calls.borrow(), vec!["delete .kibana", "bulk 6"]);
}
