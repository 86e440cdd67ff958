mod registry;
mod shpool;
mod socket;
mod tmux;
mod zellij;
mod zmosh;
mod zmx;

pub use registry::{load, select, Registry};

use async_trait::async_trait;
use std::convert::Infallible;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{ConfigError, Transport};
use crate::session::Session;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0} not found in PATH")]
    NotInstalled(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("failed to run {command}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} failed: {stderr}")]
    Failed { command: String, stderr: String },
    #[error("no version reported by {0}")]
    NoVersion(String),
    #[error("unknown backend {name:?} (valid: {valid})")]
    Unknown { name: String, valid: String },
    #[error("no supported session manager found (install zmosh, zmx, tmux, shpool, or zellij)")]
    NoneAvailable,
    #[error("multiple backends available ({0}); run 'zp backend <name>' to select one")]
    Ambiguous(String),
    #[error("{0}")]
    Selection(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How long to wait for a killed session's resource marker to disappear
/// before removing it ourselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl CleanupPolicy {
    /// Socket files can outlive a successful `kill` for a short while.
    pub const SOCKET: CleanupPolicy = CleanupPolicy {
        attempts: 10,
        interval: Duration::from_millis(50),
    };
}

/// Result of waiting on a resource marker after a kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reap {
    /// The marker went away on its own
    Vanished,
    /// The marker outlived the polling window and was removed
    Forced,
}

/// Capability set of one session manager.
///
/// Adapters are stateless: everything they need is captured when the
/// registry constructs them.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable backend name used in config and on the command line.
    fn name(&self) -> &'static str;

    /// Binary looked up on PATH.
    fn binary_name(&self) -> &'static str;

    /// Variable the tool sets inside its sessions.
    fn session_env_var(&self) -> &'static str;

    fn in_session(&self) -> bool {
        env_non_empty(self.session_env_var()).is_some()
    }

    /// Name of the caller's own session, when the tool publishes it.
    fn current_session(&self) -> Option<String> {
        None
    }

    async fn available(&self) -> Result<(), BackendError> {
        which::which(self.binary_name())
            .map(|_| ())
            .map_err(|_| BackendError::NotInstalled(self.binary_name().to_string()))
    }

    async fn version(&self) -> Result<String, BackendError>;

    async fn list(&self) -> Result<Vec<Session>, BackendError>;

    /// Low-latency listing. Defaults to `list`.
    async fn fast_list(&self) -> Result<Vec<Session>, BackendError> {
        self.list().await
    }

    /// Arguments (after the binary) that attach to or create `name`.
    fn attach_args(&self, name: &str) -> Vec<String>;

    /// Replace the current process with the attach invocation.
    fn attach(&self, name: &str) -> Result<Infallible, BackendError> {
        exec_replace(self.binary_name(), &self.attach_args(name))
    }

    /// Shell command equivalent to `attach`, optionally run from `dir`.
    fn attach_command(&self, name: &str, dir: Option<&Path>) -> String {
        let command = format!("{} attach {}", self.binary_name(), shell_quote(name));
        with_dir(dir, command)
    }

    /// Remote transport settings, for backends that support one.
    fn transport(&self) -> Option<&Transport> {
        None
    }

    /// Shell command that detaches the current client.
    fn detach_command(&self) -> String;

    /// Arguments (after the binary) that terminate `name`.
    fn kill_args(&self, name: &str) -> Vec<String>;

    /// File whose presence keeps a session listed, if the backend has one.
    async fn resource_marker(&self, _name: &str) -> Option<PathBuf> {
        None
    }

    fn cleanup_policy(&self) -> Option<CleanupPolicy> {
        None
    }

    async fn kill(&self, name: &str) -> Result<(), BackendError> {
        let args = self.kill_args(name);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool(self.binary_name(), &args).await?;

        if let Some(policy) = self.cleanup_policy() {
            if let Some(marker) = self.resource_marker(name).await {
                reap_marker(&marker, policy).await;
            }
        }
        Ok(())
    }
}

/// Poll for `marker` to disappear; remove it once the window is exhausted.
pub async fn reap_marker(marker: &Path, policy: CleanupPolicy) -> Reap {
    for _ in 0..policy.attempts {
        if tokio::fs::symlink_metadata(marker).await.is_err() {
            return Reap::Vanished;
        }
        tokio::time::sleep(policy.interval).await;
    }
    if tokio::fs::symlink_metadata(marker).await.is_err() {
        return Reap::Vanished;
    }
    warn!("removing stale session marker {}", marker.display());
    if let Err(e) = tokio::fs::remove_file(marker).await {
        debug!("failed to remove {}: {}", marker.display(), e);
    }
    Reap::Forced
}

/// Value of an environment variable, treating empty as unset.
pub fn env_non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Double-quote a value for the shell that evaluates our output.
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Prefix `command` with a directory change when `dir` is given.
pub fn with_dir(dir: Option<&Path>, command: String) -> String {
    match dir {
        Some(dir) => format!(
            "cd {} && {}",
            shell_quote(&dir.to_string_lossy()),
            command
        ),
        None => command,
    }
}

/// Command the caller's shell evaluates to hand its terminal to `name`.
pub fn launch_command(backend: &dyn Backend, name: &str, dir: Option<&Path>) -> String {
    with_dir(dir, format!("exec {}", backend.attach_command(name, None)))
}

/// Last field of the first non-empty line: handles `tmux 3.4`,
/// `zmosh\t\t0.4.0` and multi-line version banners.
pub fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

/// Replace the current process image. Only returns on failure.
pub fn exec_replace(program: &str, args: &[String]) -> Result<Infallible, BackendError> {
    let path =
        which::which(program).map_err(|_| BackendError::NotInstalled(program.to_string()))?;
    debug!("exec {} {:?}", path.display(), args);
    let source = std::process::Command::new(path).args(args).exec();
    Err(BackendError::Spawn {
        command: program.to_string(),
        source,
    })
}

/// Run a tool and return its raw output regardless of exit status.
pub(crate) async fn tool_output(program: &str, args: &[&str]) -> Result<Output, BackendError> {
    debug!("running {} {:?}", program, args);
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| BackendError::Spawn {
            command: format!("{} {}", program, args.join(" ")),
            source,
        })
}

/// Run a tool, failing on a non-zero exit, and return its stdout.
pub(crate) async fn run_tool(program: &str, args: &[&str]) -> Result<String, BackendError> {
    let output = tool_output(program, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(BackendError::Failed {
            command: format!("{} {}", program, args.join(" ")),
            stderr: if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            },
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Version from a tool's own version subcommand.
pub(crate) async fn tool_version(program: &str, args: &[&str]) -> Result<String, BackendError> {
    let output = run_tool(program, args).await?;
    parse_version(&output).ok_or_else(|| BackendError::NoVersion(program.to_string()))
}
