use async_trait::async_trait;
use std::path::PathBuf;

use super::zmosh::{fast_list_or, parse_sessions};
use super::{env_non_empty, run_tool, socket, tool_version, Backend, BackendError, CleanupPolicy};
use crate::session::Session;

/// Standalone zmx, without the zmosh wrapper. Shares its list format and
/// socket directory with zmosh.
pub struct Zmx;

#[async_trait]
impl Backend for Zmx {
    fn name(&self) -> &'static str {
        "zmx"
    }

    fn binary_name(&self) -> &'static str {
        "zmx"
    }

    fn session_env_var(&self) -> &'static str {
        "ZMX_SESSION"
    }

    fn current_session(&self) -> Option<String> {
        env_non_empty(self.session_env_var())
    }

    async fn version(&self) -> Result<String, BackendError> {
        tool_version("zmx", &["version"]).await
    }

    async fn list(&self) -> Result<Vec<Session>, BackendError> {
        let output = run_tool("zmx", &["list"]).await?;
        Ok(parse_sessions(&output, self.current_session().as_deref()))
    }

    async fn fast_list(&self) -> Result<Vec<Session>, BackendError> {
        fast_list_or(self).await
    }

    fn attach_args(&self, name: &str) -> Vec<String> {
        vec!["attach".to_string(), name.to_string()]
    }

    fn detach_command(&self) -> String {
        "zmx detach".to_string()
    }

    fn kill_args(&self, name: &str) -> Vec<String> {
        vec!["kill".to_string(), name.to_string()]
    }

    async fn resource_marker(&self, name: &str) -> Option<PathBuf> {
        socket::resolve_dir().await.map(|dir| dir.join(name))
    }

    fn cleanup_policy(&self) -> Option<CleanupPolicy> {
        Some(CleanupPolicy::SOCKET)
    }
}
