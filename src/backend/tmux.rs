use async_trait::async_trait;
use std::path::Path;

use super::{shell_quote, tool_output, tool_version, Backend, BackendError};
use crate::session::Session;

/// Format: session_name\tsession_attached\tpane_current_path
const LIST_FORMAT: &str = "#{session_name}\t#{session_attached}\t#{pane_current_path}";

/// tmux, driven through its CLI.
pub struct Tmux;

#[async_trait]
impl Backend for Tmux {
    fn name(&self) -> &'static str {
        "tmux"
    }

    fn binary_name(&self) -> &'static str {
        "tmux"
    }

    fn session_env_var(&self) -> &'static str {
        "TMUX"
    }

    async fn version(&self) -> Result<String, BackendError> {
        tool_version("tmux", &["-V"]).await
    }

    async fn list(&self) -> Result<Vec<Session>, BackendError> {
        let output = tool_output("tmux", &["list-sessions", "-F", LIST_FORMAT]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // No server means no sessions.
            if output.status.code() == Some(1)
                || stderr.contains("no server running")
                || stderr.contains("no sessions")
            {
                return Ok(Vec::new());
            }
            return Err(BackendError::Failed {
                command: "tmux list-sessions".to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(parse_sessions(&String::from_utf8_lossy(&output.stdout)))
    }

    fn attach_args(&self, name: &str) -> Vec<String> {
        vec![
            "new-session".to_string(),
            "-A".to_string(),
            "-s".to_string(),
            name.to_string(),
        ]
    }

    fn attach_command(&self, name: &str, dir: Option<&Path>) -> String {
        match dir {
            Some(dir) => format!(
                "tmux new-session -A -s {} -c {}",
                shell_quote(name),
                shell_quote(&dir.to_string_lossy())
            ),
            None => format!("tmux new-session -A -s {}", shell_quote(name)),
        }
    }

    fn detach_command(&self) -> String {
        "tmux detach-client".to_string()
    }

    fn kill_args(&self, name: &str) -> Vec<String> {
        vec!["kill-session".to_string(), "-t".to_string(), name.to_string()]
    }
}

fn parse_sessions(output: &str) -> Vec<Session> {
    output.lines().filter_map(parse_session_line).collect()
}

fn parse_session_line(line: &str) -> Option<Session> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parts: Vec<&str> = line.split('\t').collect();
    let name = parts[0].trim();
    if name.is_empty() {
        return None;
    }

    let mut session = Session::new(name);
    if let Some(attached) = parts.get(1) {
        session.clients = attached.trim().parse().ok()?;
    }
    if let Some(path) = parts.get(2).map(|p| p.trim()).filter(|p| !p.is_empty()) {
        session.started_in = path.to_string();
    }
    Some(session.resolve_active(None))
}
