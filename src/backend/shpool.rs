use async_trait::async_trait;

use super::{env_non_empty, run_tool, tool_output, tool_version, Backend, BackendError};
use crate::session::Session;

/// shpool. Needs its daemon running before anything else works.
pub struct Shpool;

#[async_trait]
impl Backend for Shpool {
    fn name(&self) -> &'static str {
        "shpool"
    }

    fn binary_name(&self) -> &'static str {
        "shpool"
    }

    fn session_env_var(&self) -> &'static str {
        "SHPOOL_SESSION_NAME"
    }

    fn current_session(&self) -> Option<String> {
        env_non_empty(self.session_env_var())
    }

    async fn available(&self) -> Result<(), BackendError> {
        which::which("shpool").map_err(|_| BackendError::NotInstalled("shpool".to_string()))?;
        let daemon_up = tool_output("shpool", &["status"])
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);
        if !daemon_up {
            return Err(BackendError::Unavailable(
                "shpool daemon not running (start with: shpool daemon)".to_string(),
            ));
        }
        Ok(())
    }

    async fn version(&self) -> Result<String, BackendError> {
        tool_version("shpool", &["version"]).await
    }

    async fn list(&self) -> Result<Vec<Session>, BackendError> {
        let output = run_tool("shpool", &["list"]).await?;
        Ok(parse_sessions(&output, self.current_session().as_deref()))
    }

    fn attach_args(&self, name: &str) -> Vec<String> {
        vec!["attach".to_string(), name.to_string()]
    }

    fn detach_command(&self) -> String {
        "shpool detach".to_string()
    }

    fn kill_args(&self, name: &str) -> Vec<String> {
        vec!["kill".to_string(), name.to_string()]
    }
}

/// One session per line; the first whitespace-separated field is the name.
/// A `NAME ...` header line is skipped.
fn parse_sessions(output: &str, current: Option<&str>) -> Vec<Session> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| *name != "NAME")
        .map(|name| Session::new(name).resolve_active(current))
        .collect()
}
