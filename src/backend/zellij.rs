use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::{
    env_non_empty, shell_quote, tool_output, tool_version, with_dir, Backend, BackendError,
};
use crate::session::Session;

/// zellij. Older releases lack `--short --no-formatting`, so listing
/// retries with the bare subcommand.
pub struct Zellij;

#[async_trait]
impl Backend for Zellij {
    fn name(&self) -> &'static str {
        "zellij"
    }

    fn binary_name(&self) -> &'static str {
        "zellij"
    }

    fn session_env_var(&self) -> &'static str {
        "ZELLIJ"
    }

    fn current_session(&self) -> Option<String> {
        env_non_empty("ZELLIJ_SESSION_NAME")
    }

    async fn version(&self) -> Result<String, BackendError> {
        tool_version("zellij", &["--version"]).await
    }

    async fn list(&self) -> Result<Vec<Session>, BackendError> {
        let current = self.current_session();
        let output = tool_output("zellij", &["list-sessions", "--short", "--no-formatting"]).await?;
        let text = combined(&output);
        if output.status.success() {
            return Ok(parse_sessions(&text, current.as_deref()));
        }

        // Exit code 1 with "No active sessions" just means nothing is running.
        if text.contains("No active") || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        debug!("zellij short listing failed, retrying without flags");
        let output = tool_output("zellij", &["list-sessions"]).await?;
        let text = combined(&output);
        if !output.status.success() {
            return Err(BackendError::Failed {
                command: "zellij list-sessions".to_string(),
                stderr: text.trim().to_string(),
            });
        }
        Ok(parse_sessions(&text, current.as_deref()))
    }

    fn attach_args(&self, name: &str) -> Vec<String> {
        vec!["attach".to_string(), "--create".to_string(), name.to_string()]
    }

    fn attach_command(&self, name: &str, dir: Option<&Path>) -> String {
        with_dir(dir, format!("zellij attach --create {}", shell_quote(name)))
    }

    fn detach_command(&self) -> String {
        "zellij action detach".to_string()
    }

    fn kill_args(&self, name: &str) -> Vec<String> {
        vec!["kill-session".to_string(), name.to_string()]
    }
}

fn combined(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Lines are bare names or `name [Created ...] (current)` /
/// `name (EXITED - attach to resurrect)`. Exited sessions are skipped.
fn parse_sessions(output: &str, current: Option<&str>) -> Vec<Session> {
    let mut sessions = Vec::new();
    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("No active") {
            continue;
        }

        let (name, annotations) = match line.find(['(', '[']) {
            Some(0) => continue,
            Some(idx) => (line[..idx].trim(), line[idx..].to_lowercase()),
            None => (line, String::new()),
        };
        if annotations.contains("exited") {
            continue;
        }

        let mut session = Session::new(name).resolve_active(current);
        if annotations.contains("(current)") {
            session.active = true;
        }
        sessions.push(session);
    }
    sessions
}
