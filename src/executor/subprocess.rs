//! Subprocess execution.
//!
//! Provides utilities for running external commands safely with:
//! - No shell interpretation (direct exec)
//! - Configurable timeouts
//! - Captured stdout/stderr
//! - Optional execution as another local user

use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use nix::unistd::{getuid, User};
use tracing::{debug, warn};

use crate::error::{AgentError, AgentResult, CommandErrorKind};

use super::output::command_line;

/// Default timeout applied to commands that do not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Return code recorded when a process was terminated by a signal.
pub const SIGNALLED_RETURN_CODE: i32 = -1;

/// Result of one subprocess execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// The exit code, or [`SIGNALLED_RETURN_CODE`] if the process had none.
    pub return_code: i32,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl ExecResult {
    /// Create a result from its parts.
    pub fn new(return_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            return_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.return_code == 0
    }
}

/// Minimum time allowed for reading output after the process exits.
const OUTPUT_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read a child pipe to EOF on its own thread so a chatty process never
/// blocks on a full pipe while we poll for its exit.
///
/// Returns how many readers were started (0 or 1).
fn drain<R: Read + Send + 'static>(
    pipe: Option<R>,
    stream: Stream,
    tx: &Sender<(Stream, Vec<u8>)>,
) -> usize {
    match pipe {
        Some(mut pipe) => {
            let tx = tx.clone();
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send((stream, buf));
            });
            1
        }
        None => 0,
    }
}

/// Collect drained output until `deadline`.
///
/// A background process that inherited the pipes can keep them open after
/// the child exits; whatever has not arrived by the deadline is dropped.
fn collect(
    rx: &Receiver<(Stream, Vec<u8>)>,
    mut pending: usize,
    deadline: Instant,
) -> (String, String) {
    let wait_until = deadline.max(Instant::now() + OUTPUT_GRACE);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    while pending > 0 {
        let remaining = wait_until.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, buf)) => stdout = buf,
            Ok((Stream::Stderr, buf)) => stderr = buf,
            Err(_) => {
                warn!(
                    pending,
                    "Output pipes still open after process exit; output truncated"
                );
                break;
            }
        }
        pending -= 1;
    }

    (
        String::from_utf8_lossy(&stdout).to_string(),
        String::from_utf8_lossy(&stderr).to_string(),
    )
}

/// Description of one external command.
///
/// Built with a by-value builder and executed by a [`CommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    user: Option<String>,
    timeout: Duration,
}

impl CommandSpec {
    /// Create a new command for `program`.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            user: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// `service <name> <action>`, the LSB init-script entry point.
    pub fn service(name: &str, action: &str) -> Self {
        Self::new("service").args([name, action])
    }

    /// Add arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Run the command as `user` instead of the current user.
    pub fn as_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// Set the timeout for the command.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The program to execute.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The user this command should run as, if not the current one.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// The configured timeout.
    pub fn configured_timeout(&self) -> Duration {
        self.timeout
    }

    /// Human-readable command line, used in logs and error messages.
    pub fn display(&self) -> String {
        command_line(&self.program, &self.args)
    }

    /// The argv actually executed, wrapping with `runuser` when the
    /// requested user differs from the current one.
    fn effective_argv(&self) -> (String, Vec<String>) {
        match self.user.as_deref() {
            Some(user) if !is_current_user(user) => {
                let mut args = vec![
                    "-u".to_string(),
                    user.to_string(),
                    "--".to_string(),
                    self.program.clone(),
                ];
                args.extend(self.args.iter().cloned());
                ("runuser".to_string(), args)
            }
            _ => (self.program.clone(), self.args.clone()),
        }
    }

    /// Execute the command and wait for completion with timeout enforcement.
    ///
    /// If the process exceeds the configured timeout, it is killed and
    /// a timeout error is returned. A non-zero exit is not an error here;
    /// interpreting the return code is the caller's job.
    pub fn execute(&self) -> AgentResult<ExecResult> {
        let (program, args) = self.effective_argv();

        debug!(
            program = %program,
            args = ?args,
            timeout_secs = self.timeout.as_secs(),
            "Executing subprocess"
        );

        let mut cmd = Command::new(&program);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| AgentError::Command {
            kind: CommandErrorKind::SpawnFailed {
                program: program.clone(),
                message: e.to_string(),
            },
        })?;

        let (tx, rx) = mpsc::channel();
        let readers = drain(child.stdout.take(), Stream::Stdout, &tx)
            + drain(child.stderr.take(), Stream::Stderr, &tx);

        let start = Instant::now();
        let poll_interval = Duration::from_millis(100);

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let (stdout, stderr) = collect(&rx, readers, start + self.timeout);
                    let result = ExecResult {
                        return_code: status.code().unwrap_or(SIGNALLED_RETURN_CODE),
                        stdout,
                        stderr,
                    };
                    debug!(
                        return_code = result.return_code,
                        duration_ms = start.elapsed().as_millis(),
                        "Subprocess completed"
                    );
                    return Ok(result);
                }
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        warn!(
                            program = %program,
                            timeout_secs = self.timeout.as_secs(),
                            "Process timed out, killing"
                        );
                        if let Err(e) = child.kill() {
                            warn!(error = %e, "Failed to kill timed-out process");
                        }
                        // Reap the zombie
                        let _ = child.wait();
                        return Err(AgentError::Command {
                            kind: CommandErrorKind::Timeout {
                                timeout_secs: self.timeout.as_secs(),
                            },
                        });
                    }
                    std::thread::sleep(poll_interval);
                }
                Err(e) => {
                    return Err(AgentError::Command {
                        kind: CommandErrorKind::WaitFailed {
                            message: format!("Failed to check process status: {}", e),
                        },
                    });
                }
            }
        }
    }
}

fn is_current_user(name: &str) -> bool {
    match User::from_uid(getuid()) {
        Ok(Some(current)) => current.name == name,
        _ => false,
    }
}

/// The process boundary.
///
/// Everything that spawns an external command goes through this trait so
/// lifecycle logic can be exercised against scripted results.
pub trait CommandRunner {
    /// Run a command to completion and return its captured result.
    fn run(&self, spec: &CommandSpec) -> AgentResult<ExecResult>;

    /// Run a command and treat any non-zero exit as an execution failure.
    fn run_checked(&self, spec: &CommandSpec) -> AgentResult<ExecResult> {
        let result = self.run(spec)?;
        if !result.success() {
            return Err(AgentError::ExecutionFailed {
                command: spec.display(),
                return_code: result.return_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}

/// Runs commands on the local host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> AgentResult<ExecResult> {
        spec.execute()
    }
}
