use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    env_non_empty, run_tool, shell_quote, socket, tool_version, with_dir, Backend,
    BackendError, CleanupPolicy,
};
use crate::config::Transport;
use crate::session::Session;

/// zmosh: zmx sessions with an optional UDP transport for remote attach.
pub struct Zmosh {
    transport: Transport,
}

impl Zmosh {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Backend for Zmosh {
    fn name(&self) -> &'static str {
        "zmosh"
    }

    fn binary_name(&self) -> &'static str {
        "zmosh"
    }

    fn session_env_var(&self) -> &'static str {
        "ZMX_SESSION"
    }

    fn current_session(&self) -> Option<String> {
        env_non_empty(self.session_env_var())
    }

    async fn version(&self) -> Result<String, BackendError> {
        tool_version("zmosh", &["version"]).await
    }

    async fn list(&self) -> Result<Vec<Session>, BackendError> {
        let output = run_tool("zmosh", &["list"]).await?;
        Ok(parse_sessions(&output, self.current_session().as_deref()))
    }

    async fn fast_list(&self) -> Result<Vec<Session>, BackendError> {
        fast_list_or(self).await
    }

    fn attach_args(&self, name: &str) -> Vec<String> {
        vec!["attach".to_string(), name.to_string()]
    }

    fn attach_command(&self, name: &str, dir: Option<&Path>) -> String {
        let command = match self.transport.remote_host() {
            Some(host) => format!(
                "zmosh attach -r {} {}",
                shell_quote(host),
                shell_quote(name)
            ),
            None => format!("zmosh attach {}", shell_quote(name)),
        };
        with_dir(dir, command)
    }

    fn transport(&self) -> Option<&Transport> {
        Some(&self.transport)
    }

    fn detach_command(&self) -> String {
        "zmosh detach".to_string()
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

/// Read the socket directory directly, falling back to `list` on any
/// resolution or read failure.
pub(super) async fn fast_list_or(backend: &dyn Backend) -> Result<Vec<Session>, BackendError> {
    let current = backend.current_session();
    if let Some(dir) = socket::resolve_dir().await {
        match socket::list_dir(&dir, current.as_deref()).await {
            Ok(sessions) => return Ok(sessions),
            Err(e) => debug!("socket listing of {} failed: {}", dir.display(), e),
        }
    }
    backend.list().await
}

/// Parse `zmosh list` / `zmx list` output.
///
/// Each line holds tab-separated `key=value` fields, e.g.
/// `session_name=foo\tpid=123\tclients=1\tstarted_in=~/bar`. The caller's own
/// session may be prefixed with `→ `. Lines without a session name are skipped.
pub fn parse_sessions(output: &str, current: Option<&str>) -> Vec<Session> {
    output.lines().filter_map(|line| parse_line(line, current)).collect()
}

fn parse_line(line: &str, current: Option<&str>) -> Option<Session> {
    let line = line.trim();
    let line = line.strip_prefix('\u{2192}').unwrap_or(line).trim();
    if line.is_empty() {
        return None;
    }

    let mut name = None;
    let mut session = Session::new("");
    for field in line.split('\t') {
        let Some((key, value)) = field.trim().split_once('=') else {
            continue;
        };
        match key {
            "session_name" if !value.is_empty() => name = Some(value.to_string()),
            "pid" => session.pid = value.parse().ok(),
            "clients" => session.clients = value.parse().unwrap_or(0),
            "started_in" if !value.is_empty() => session.started_in = value.to_string(),
            _ => {}
        }
    }

    session.name = name?;
    Some(session.resolve_active(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::testing::MockBackend;
    use serial_test::serial;
    use tempfile::TempDir;

    fn zmosh() -> Zmosh {
        Zmosh::new(Transport::default())
    }

    #[test]
    fn test_identity() {
        let b = zmosh();
        assert_eq!(b.name(), "zmosh");
        assert_eq!(b.binary_name(), "zmosh");
        assert_eq!(b.session_env_var(), "ZMX_SESSION");
        assert_eq!(b.cleanup_policy(), Some(CleanupPolicy::SOCKET));
    }

    #[test]
    fn test_attach_command() {
        let b = zmosh();
        assert_eq!(b.attach_command("my-session", None), r#"zmosh attach "my-session""#);
        assert_eq!(
            b.attach_command("my-session", Some(Path::new("/tmp/foo"))),
            r#"cd "/tmp/foo" && zmosh attach "my-session""#
        );
    }

    #[test]
    fn test_attach_command_udp() {
        let b = Zmosh::new(Transport {
            enabled: true,
            host: Some("myhost".to_string()),
        });
        assert_eq!(
            b.attach_command("my-session", None),
            r#"zmosh attach -r "myhost" "my-session""#
        );
    }

    #[test]
    fn test_attach_command_udp_host_is_quoted() {
        let b = Zmosh::new(Transport {
            enabled: true,
            host: Some("box; rm -rf ~".to_string()),
        });
        assert_eq!(
            b.attach_command("s", None),
            r#"zmosh attach -r "box; rm -rf ~" "s""#
        );

        let b = Zmosh::new(Transport {
            enabled: true,
            host: Some("$(touch x)".to_string()),
        });
        assert_eq!(b.attach_command("s", None), r#"zmosh attach -r "\$(touch x)" "s""#);
    }

    #[test]
    fn test_attach_command_udp_without_host() {
        let b = Zmosh::new(Transport {
            enabled: true,
            host: None,
        });
        assert_eq!(b.attach_command("my-session", None), r#"zmosh attach "my-session""#);
    }

    #[test]
    fn test_attach_command_udp_disabled() {
        let b = Zmosh::new(Transport {
            enabled: false,
            host: Some("myhost".to_string()),
        });
        assert_eq!(b.attach_command("my-session", None), r#"zmosh attach "my-session""#);
    }

    #[test]
    fn test_parse_sessions() {
        let input = "  session_name=apcsp-1\tpid=1234\tclients=1\tcreated_at=1771652262707138000\ttask_ended_at=0\tstarted_in=~/GitHub/apcsp\n\
                     \n\
                     garbage line without fields\n\
                     pid=99\tclients=3\n\
                     \u{2192} session_name=bbcli\tpid=5678\tclients=0\tstarted_in=~/Documents/bbcli\n";

        let sessions = parse_sessions(input, Some("bbcli"));
        assert_eq!(sessions.len(), 2);

        assert_eq!(sessions[0].name, "apcsp-1");
        assert_eq!(sessions[0].pid, Some(1234));
        assert_eq!(sessions[0].clients, 1);
        assert_eq!(sessions[0].started_in, "~/GitHub/apcsp");
        assert!(sessions[0].active);

        assert_eq!(sessions[1].name, "bbcli");
        assert_eq!(sessions[1].clients, 0);
        assert!(sessions[1].active, "current session is active without clients");
    }

    #[test]
    fn test_parse_sessions_current_must_match_exactly() {
        let input = "session_name=work\tclients=0\nsession_name=work-2\tclients=0\n";
        let sessions = parse_sessions(input, Some("work-2"));
        assert!(!sessions[0].active);
        assert!(sessions[1].active);
    }

    #[test]
    fn test_parse_sessions_defaults() {
        let sessions = parse_sessions("session_name=solo\tpid=abc\n", None);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].pid, None);
        assert_eq!(sessions[0].clients, 0);
        assert_eq!(sessions[0].started_in, "~");
        assert!(!sessions[0].active);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_sessions("", None).is_empty());
        assert!(parse_sessions("\n\n  \n", None).is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_fast_list_falls_back_when_socket_dir_is_missing() {
        let dir = TempDir::new().unwrap();
        let saved = std::env::var_os("ZMX_DIR");
        std::env::set_var("ZMX_DIR", dir.path().join("missing"));

        let backend = MockBackend::with_sessions(&["a", "b"]);
        let result = fast_list_or(&backend).await;

        match saved {
            Some(value) => std::env::set_var("ZMX_DIR", value),
            None => std::env::remove_var("ZMX_DIR"),
        }
        let names: Vec<String> = result.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
