//! mpack-agent - lifecycle driver for the Elasticsearch and Kibana services.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mpack_agent::config::{Settings, DEFAULT_CONFIG_PATH};
use mpack_agent::dashboard::{load_dashboard, HttpIndexClient};
use mpack_agent::error::{AgentError, AgentResult};
use mpack_agent::executor::SystemRunner;
use mpack_agent::lifecycle::{LifecycleController, LifecycleState, Verb};
use mpack_agent::materialize::Materializer;
use mpack_agent::services::ServiceRegistry;
use mpack_agent::status::ServiceStatus;
use mpack_agent::templates::TemplateEngine;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

/// LSB "program is not running".
const EXIT_NOT_RUNNING: u8 = 3;

/// A parsed command line.
#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    config_path: Option<String>,
    service: String,
    verb: String,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let invocation = match parse_args(&args[1..]) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{}\n\nRun '{} --help' for usage.", message, NAME);
            return ExitCode::FAILURE;
        }
    };

    let settings = match load_settings(invocation.config_path.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        service = %invocation.service,
        verb = %invocation.verb,
        "{} v{}",
        NAME,
        VERSION
    );

    match run(&settings, &invocation.service, &invocation.verb) {
        Ok(Some(ServiceStatus::NotRunning)) => {
            println!("{}: not running", invocation.service);
            ExitCode::from(EXIT_NOT_RUNNING)
        }
        Ok(Some(status)) => {
            println!("{}: {}", invocation.service, status);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!(
                service = %invocation.service,
                verb = %invocation.verb,
                error = %e,
                "Operation failed"
            );
            ExitCode::FAILURE
        }
    }
}

/// Execute one verb. Returns the status for `status`, `None` otherwise.
fn run(settings: &Settings, service_name: &str, verb: &str) -> AgentResult<Option<ServiceStatus>> {
    let registry = ServiceRegistry::new(settings);
    let service = registry.require(service_name)?;
    let verb: Verb = verb.parse()?;

    if verb == Verb::LoadTemplate {
        if service_name != "kibana" {
            return Err(AgentError::invalid_parameter(
                "verb",
                format!("'{}' is only supported for kibana", verb),
            ));
        }
        let kibana = registry.kibana();
        let client = HttpIndexClient::new(&kibana.index_url(), settings.limits.http_timeout());
        load_dashboard(&client, kibana.dashboard_file())?;
        return Ok(None);
    }

    // Nothing is known about the live service; only `install` may assume
    // the packages are absent.
    let initial = if verb == Verb::Install {
        LifecycleState::NotInstalled
    } else {
        LifecycleState::Installed
    };
    let mut controller = LifecycleController::new(
        service,
        SystemRunner,
        Materializer::new(template_engine(&settings.paths.templates_dir)?),
        settings.platform.os_family.resolve(),
        settings.limits.clone(),
    )
    .with_state(initial);

    match verb {
        Verb::Install => controller.install()?,
        Verb::Configure => {
            let report = controller.configure()?;
            info!(
                created = report.created_directories.len(),
                changed = report.changed_files.len(),
                "Configuration applied"
            );
        }
        Verb::Start => controller.start()?,
        Verb::Stop => controller.stop()?,
        Verb::Restart => controller.restart()?,
        Verb::Status => return controller.status().map(Some),
        Verb::LoadTemplate => {}
    }

    Ok(None)
}

fn template_engine(dir: &Path) -> AgentResult<TemplateEngine> {
    if dir.is_dir() {
        TemplateEngine::new(dir)
    } else {
        warn!(directory = %dir.display(), "Template directory not found; named templates unavailable");
        Ok(TemplateEngine::empty())
    }
}

/// Load settings from an explicit path, or from the default path when it
/// exists. Without either, built-in defaults apply.
fn load_settings(explicit: Option<&str>) -> AgentResult<Settings> {
    match explicit {
        Some(path) => Settings::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Settings::load(DEFAULT_CONFIG_PATH),
        None => Ok(Settings::default()),
    }
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Install, configure and control the Elasticsearch and Kibana services.

USAGE:
    {} [OPTIONS] <SERVICE> <VERB>

SERVICES:
    elasticsearch, kibana

VERBS:
    install, configure, start, stop, restart, status,
    load-template (kibana only)

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information

EXIT STATUS:
    0 success (status: running), 3 not running, 1 error
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

/// Split arguments (without the program name) into config path and the
/// two positionals.
fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut config_path = None;
    let mut positionals = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "-c" {
            let path = iter
                .next()
                .ok_or_else(|| format!("Missing value for {}", arg))?;
            config_path = Some(path.clone());
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config_path = Some(path.to_string());
        } else if arg.starts_with('-') {
            return Err(format!("Unknown option: {}", arg));
        } else {
            positionals.push(arg.clone());
        }
    }

    match <[String; 2]>::try_from(positionals) {
        Ok([service, verb]) => Ok(Invocation {
            config_path,
            service,
            verb,
        }),
        Err(_) => Err("Expected exactly two arguments: <SERVICE> <VERB>".to_string()),
    }
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    // stdout carries the status line
    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
