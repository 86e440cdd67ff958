//! Socket directory shared by zmosh and zmx. Every live session owns one
//! socket file named after it, which makes listing a directory read.

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{env_non_empty, tool_output};
use crate::session::Session;

/// Locate the socket directory.
///
/// Order: `$ZMX_DIR`, `$XDG_RUNTIME_DIR/zmx`, `$TMPDIR/zmx-<uid>`, then the
/// `socket_dir` line printed by `zmosh version` or `zmx version`.
pub async fn resolve_dir() -> Option<PathBuf> {
    resolve_dir_with(env_non_empty).await
}

async fn resolve_dir_with<F>(env: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = env("ZMX_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Some(runtime) = env("XDG_RUNTIME_DIR") {
        let candidate = PathBuf::from(runtime).join("zmx");
        if candidate.is_dir() {
            return Some(candidate);
        }
    }
    if let Some(tmp) = env("TMPDIR") {
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        let candidate = PathBuf::from(tmp).join(format!("zmx-{}", uid));
        if candidate.is_dir() {
            return Some(candidate);
        }
    }
    for bin in ["zmosh", "zmx"] {
        match tool_output(bin, &["version"]).await {
            Ok(output) if output.status.success() => {
                if let Some(dir) = parse_socket_dir(&String::from_utf8_lossy(&output.stdout)) {
                    return Some(dir);
                }
            }
            Ok(_) => {}
            Err(e) => debug!("{}", e),
        }
    }
    None
}

fn parse_socket_dir(version_output: &str) -> Option<PathBuf> {
    version_output
        .lines()
        .find(|line| line.trim_start().starts_with("socket_dir"))
        .and_then(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            (fields.len() >= 2).then(|| PathBuf::from(fields[fields.len() - 1]))
        })
}

/// One session per socket file in `dir`, sorted by name. Directories and
/// regular files are ignored.
pub async fn list_dir(dir: &Path, current: Option<&str>) -> io::Result<Vec<Session>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut sessions = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let is_socket = match entry.file_type().await {
            Ok(file_type) => file_type.is_socket(),
            Err(_) => continue,
        };
        if !is_socket {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        sessions.push(Session::new(name).resolve_active(current));
    }

    sessions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_dir_only_sockets() {
        let dir = TempDir::new().unwrap();
        let _work = UnixListener::bind(dir.path().join("work")).unwrap();
        let _play = UnixListener::bind(dir.path().join("play")).unwrap();
        std::fs::create_dir(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("lock"), "x").unwrap();

        let sessions = list_dir(dir.path(), None).await.unwrap();
        let names: Vec<&str> = sessions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["play", "work"]);
        assert!(sessions.iter().all(|s| s.started_in == "~" && !s.active));
    }

    #[tokio::test]
    async fn test_list_dir_marks_current() {
        let dir = TempDir::new().unwrap();
        let _a = UnixListener::bind(dir.path().join("active-sess")).unwrap();
        let _b = UnixListener::bind(dir.path().join("active-sess-2")).unwrap();

        let sessions = list_dir(dir.path(), Some("active-sess")).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].active);
        assert!(!sessions[1].active);
    }

    #[tokio::test]
    async fn test_list_dir_missing() {
        let dir = TempDir::new().unwrap();
        assert!(list_dir(&dir.path().join("nope"), None).await.is_err());
    }

    #[test]
    fn test_parse_socket_dir() {
        let output = "zmosh\t\t0.4.0\nsocket_dir\t/run/user/1000/zmx\n";
        assert_eq!(
            parse_socket_dir(output),
            Some(PathBuf::from("/run/user/1000/zmx"))
        );
        assert_eq!(parse_socket_dir("zmosh 0.4.0\n"), None);
    }

    fn fake_env(vars: Vec<(&'static str, String)>) -> impl Fn(&str) -> Option<String> {
        move |key| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
        }
    }

    #[tokio::test]
    async fn test_resolve_dir_prefers_zmx_dir() {
        let dir = TempDir::new().unwrap();
        let env = fake_env(vec![
            ("ZMX_DIR", dir.path().display().to_string()),
            ("TMPDIR", "/nonexistent".to_string()),
        ]);
        assert_eq!(resolve_dir_with(env).await.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_resolve_dir_runtime_dir() {
        let runtime = TempDir::new().unwrap();
        std::fs::create_dir(runtime.path().join("zmx")).unwrap();
        let env = fake_env(vec![("XDG_RUNTIME_DIR", runtime.path().display().to_string())]);
        assert_eq!(resolve_dir_with(env).await, Some(runtime.path().join("zmx")));
    }

    #[tokio::test]
    async fn test_resolve_dir_tmpdir_uid() {
        let tmp = TempDir::new().unwrap();
        let uid = unsafe { libc::getuid() };
        let candidate = tmp.path().join(format!("zmx-{}", uid));
        std::fs::create_dir_all(&candidate).unwrap();

        // An XDG_RUNTIME_DIR without a zmx subdirectory is skipped.
        let runtime = TempDir::new().unwrap();
        let env = fake_env(vec![
            ("XDG_RUNTIME_DIR", runtime.path().display().to_string()),
            ("TMPDIR", tmp.path().display().to_string()),
        ]);
        assert_eq!(resolve_dir_with(env).await, Some(candidate));
    }
}
