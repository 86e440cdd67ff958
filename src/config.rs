use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Apps guarded when no guard.conf exists yet
pub const DEFAULT_GUARD_APPS: &[&str] = &["claude", "codex", "opencode"];

const BACKEND_FILE: &str = "backend";
const TRANSPORT_FILE: &str = "udp.conf";
const GUARD_FILE: &str = "guard.conf";

static RE_APP_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap());

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid app name {0:?}: must match [a-zA-Z][a-zA-Z0-9_-]*")]
    InvalidAppName(String),
    #[error("{0:?} is already guarded")]
    AlreadyGuarded(String),
    #[error("{0:?} is not in the guard list")]
    NotGuarded(String),
    #[error("cannot access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Remote transport settings for backends that can attach over UDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    pub enabled: bool,
    pub host: Option<String>,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            enabled: true,
            host: None,
        }
    }
}

impl Transport {
    /// Host to attach through, only when the transport is switched on.
    pub fn remote_host(&self) -> Option<&str> {
        self.host.as_deref().filter(|_| self.enabled)
    }
}

/// Small text-file settings under the per-user config directory.
#[derive(Debug, Clone)]
pub struct Config {
    dir: PathBuf,
}

impl Config {
    /// `$XDG_CONFIG_HOME/zpick`, falling back to `~/.config/zpick`.
    pub fn from_env() -> Self {
        let dir = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(base) if !base.is_empty() => PathBuf::from(base).join("zpick"),
            _ => dirs::home_dir()
                .unwrap_or_default()
                .join(".config")
                .join("zpick"),
        };
        Self { dir }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persisted backend preference, if any.
    pub fn backend_name(&self) -> Result<Option<String>, ConfigError> {
        Ok(self
            .read(BACKEND_FILE)?
            .map(|content| content.trim().to_string())
            .filter(|name| !name.is_empty()))
    }

    pub fn set_backend_name(&self, name: &str) -> Result<(), ConfigError> {
        self.write(BACKEND_FILE, &format!("{}\n", name))
    }

    /// Transport settings; missing or unreadable files yield the defaults.
    pub fn transport(&self) -> Transport {
        match self.read(TRANSPORT_FILE) {
            Ok(Some(content)) => parse_transport(&content),
            Ok(None) => Transport::default(),
            Err(e) => {
                debug!("ignoring transport config: {}", e);
                Transport::default()
            }
        }
    }

    pub fn set_transport(&self, transport: &Transport) -> Result<(), ConfigError> {
        let mut content = format!("enabled={}\n", transport.enabled);
        if let Some(host) = transport.host.as_deref().filter(|h| !h.is_empty()) {
            content.push_str(&format!("host={}\n", host));
        }
        self.write(TRANSPORT_FILE, &content)
    }

    /// Guarded app names, or the defaults when guard.conf does not exist.
    pub fn guard_apps(&self) -> Result<Vec<String>, ConfigError> {
        Ok(match self.read(GUARD_FILE)? {
            Some(content) => parse_guard_apps(&content),
            None => DEFAULT_GUARD_APPS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn add_guard_app(&self, name: &str) -> Result<(), ConfigError> {
        validate_app_name(name)?;
        let mut apps = self.guard_apps()?;
        if apps.iter().any(|app| app == name) {
            return Err(ConfigError::AlreadyGuarded(name.to_string()));
        }
        apps.push(name.to_string());
        self.write_guard_apps(&apps)
    }

    pub fn remove_guard_app(&self, name: &str) -> Result<(), ConfigError> {
        let mut apps = self.guard_apps()?;
        let before = apps.len();
        apps.retain(|app| app != name);
        if apps.len() == before {
            return Err(ConfigError::NotGuarded(name.to_string()));
        }
        self.write_guard_apps(&apps)
    }

    fn write_guard_apps(&self, apps: &[String]) -> Result<(), ConfigError> {
        let mut content = String::from("# Apps guarded by zpick (one per line)\n");
        let mut seen = Vec::new();
        for app in apps {
            if !seen.contains(&app) {
                content.push_str(app);
                content.push('\n');
                seen.push(app);
            }
        }
        self.write(GUARD_FILE, &content)
    }

    fn read(&self, file: &str) -> Result<Option<String>, ConfigError> {
        let path = self.dir.join(file);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    fn write(&self, file: &str, content: &str) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.dir).map_err(|source| ConfigError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(file);
        fs::write(&path, content).map_err(|source| ConfigError::Io { path, source })
    }
}

/// Check a guarded app name is usable as a shell function name.
pub fn validate_app_name(name: &str) -> Result<(), ConfigError> {
    if RE_APP_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidAppName(name.to_string()))
    }
}

fn parse_transport(content: &str) -> Transport {
    let mut transport = Transport::default();
    for line in content.lines() {
        if let Some((key, value)) = line.trim().split_once('=') {
            match key {
                "enabled" => transport.enabled = value == "true",
                "host" if !value.is_empty() => transport.host = Some(value.to_string()),
                _ => {}
            }
        }
    }
    transport
}

fn parse_guard_apps(content: &str) -> Vec<String> {
    let mut apps: Vec<String> = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !apps.iter().any(|app| app == line) {
            apps.push(line.to_string());
        }
    }
    apps
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn temp_config() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::at(dir.path().join("zpick"));
        (dir, config)
    }

    #[test]
    #[serial]
    fn test_from_env_prefers_xdg_config_home() {
        let saved = std::env::var_os("XDG_CONFIG_HOME");

        std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg-test");
        assert_eq!(Config::from_env().dir(), Path::new("/tmp/xdg-test/zpick"));

        std::env::set_var("XDG_CONFIG_HOME", "");
        assert!(Config::from_env().dir().ends_with(".config/zpick"));

        match saved {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    #[test]
    fn test_backend_name_absent() {
        let (_dir, config) = temp_config();
        assert_eq!(config.backend_name().unwrap(), None);
    }

    #[test]
    fn test_backend_name_round_trip() {
        let (_dir, config) = temp_config();
        config.set_backend_name("tmux").unwrap();
        assert_eq!(config.backend_name().unwrap().as_deref(), Some("tmux"));
        let raw = fs::read_to_string(config.dir().join("backend")).unwrap();
        assert_eq!(raw, "tmux\n");
    }

    #[test]
    fn test_transport_defaults() {
        let (_dir, config) = temp_config();
        let transport = config.transport();
        assert!(transport.enabled);
        assert_eq!(transport.host, None);
        assert_eq!(transport.remote_host(), None);
    }

    #[test]
    fn test_transport_round_trip() {
        let (_dir, config) = temp_config();
        config
            .set_transport(&Transport {
                enabled: true,
                host: Some("myhost".to_string()),
            })
            .unwrap();
        assert_eq!(config.transport().remote_host(), Some("myhost"));

        config
            .set_transport(&Transport {
                enabled: false,
                host: Some("myhost".to_string()),
            })
            .unwrap();
        let transport = config.transport();
        assert!(!transport.enabled);
        assert_eq!(transport.host.as_deref(), Some("myhost"));
        assert_eq!(transport.remote_host(), None);
    }

    #[test]
    fn test_guard_apps_default_when_missing() {
        let (_dir, config) = temp_config();
        assert_eq!(config.guard_apps().unwrap(), vec!["claude", "codex", "opencode"]);
    }

    #[test]
    fn test_guard_apps_skip_comments_and_duplicates() {
        let apps = parse_guard_apps("# header\nclaude\n\n  codex  \nclaude\n");
        assert_eq!(apps, vec!["claude", "codex"]);
    }

    #[test]
    fn test_add_and_remove_guard_app() {
        let (_dir, config) = temp_config();
        config.add_guard_app("aider").unwrap();
        assert_eq!(
            config.guard_apps().unwrap(),
            vec!["claude", "codex", "opencode", "aider"]
        );

        assert!(matches!(
            config.add_guard_app("aider"),
            Err(ConfigError::AlreadyGuarded(_))
        ));

        config.remove_guard_app("codex").unwrap();
        assert_eq!(config.guard_apps().unwrap(), vec!["claude", "opencode", "aider"]);

        assert!(matches!(
            config.remove_guard_app("codex"),
            Err(ConfigError::NotGuarded(_))
        ));
    }

    #[test]
    fn test_removing_every_app_leaves_empty_list() {
        let (_dir, config) = temp_config();
        for app in DEFAULT_GUARD_APPS {
            config.remove_guard_app(app).unwrap();
        }
        assert!(config.guard_apps().unwrap().is_empty());
    }

    #[test]
    fn test_validate_app_name() {
        assert!(validate_app_name("claude").is_ok());
        assert!(validate_app_name("my-tool_2").is_ok());
        assert!(validate_app_name("2fast").is_err());
        assert!(validate_app_name("rm -rf").is_err());
        assert!(validate_app_name("").is_err());
    }
}
