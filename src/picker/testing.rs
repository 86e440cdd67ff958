//! Test doubles for code that drives a [`Terminal`] or a [`Backend`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::backend::{Backend, BackendError};
use crate::session::Session;
use crate::tty::{edit_line, Key, Terminal};

/// Terminal fed from a fixed key script. Output is captured.
pub struct ScriptedTerminal {
    keys: VecDeque<Key>,
    directory: Option<PathBuf>,
    out: Vec<u8>,
}

impl ScriptedTerminal {
    pub fn new(keys: Vec<Key>) -> Self {
        Self {
            keys: keys.into(),
            directory: None,
            out: Vec::new(),
        }
    }

    /// What the directory chooser returns.
    pub fn with_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.directory = dir;
        self
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }

    fn next(keys: &mut VecDeque<Key>) -> io::Result<Key> {
        keys.pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "key script exhausted"))
    }
}

impl Write for ScriptedTerminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Terminal for ScriptedTerminal {
    fn read_key(&mut self) -> io::Result<Key> {
        Self::next(&mut self.keys)
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let keys = &mut self.keys;
        edit_line(&mut self.out, || Self::next(keys))
    }

    fn pick_directory(&mut self) -> Option<PathBuf> {
        self.directory.take()
    }
}

/// In-memory backend. Kills remove the session and are recorded.
pub struct MockBackend {
    sessions: Mutex<Vec<Session>>,
    killed: Arc<Mutex<Vec<String>>>,
    current: Option<String>,
    failing_kills: Vec<String>,
    failing_list: bool,
    available: bool,
}

impl MockBackend {
    pub fn with_sessions(names: &[&str]) -> Self {
        Self {
            sessions: Mutex::new(names.iter().map(|n| Session::new(*n)).collect()),
            killed: Arc::new(Mutex::new(Vec::new())),
            current: None,
            failing_kills: Vec::new(),
            failing_list: false,
            available: true,
        }
    }

    /// Pretend the caller runs inside session `name`.
    pub fn in_session(mut self, name: &str) -> Self {
        self.current = Some(name.to_string());
        self
    }

    pub fn failing_kill(mut self, name: &str) -> Self {
        self.failing_kills.push(name.to_string());
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.failing_list = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Names killed so far, shared with the backend.
    pub fn killed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.killed)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn binary_name(&self) -> &'static str {
        "mock"
    }

    fn session_env_var(&self) -> &'static str {
        "MOCK_SESSION"
    }

    fn in_session(&self) -> bool {
        self.current.is_some()
    }

    fn current_session(&self) -> Option<String> {
        self.current.clone()
    }

    async fn available(&self) -> Result<(), BackendError> {
        if self.available {
            Ok(())
        } else {
            Err(BackendError::NotInstalled("mock".to_string()))
        }
    }

    async fn version(&self) -> Result<String, BackendError> {
        Ok("1.0.0".to_string())
    }

    async fn list(&self) -> Result<Vec<Session>, BackendError> {
        if self.failing_list {
            return Err(BackendError::Failed {
                command: "mock list".to_string(),
                stderr: "server crashed".to_string(),
            });
        }
        let current = self.current.as_deref();
        let sessions = self.sessions.lock().unwrap().clone();
        Ok(sessions
            .into_iter()
            .map(|s| s.resolve_active(current))
            .collect())
    }

    fn attach_args(&self, name: &str) -> Vec<String> {
        vec!["attach".to_string(), name.to_string()]
    }

    fn detach_command(&self) -> String {
        "mock detach".to_string()
    }

    fn kill_args(&self, name: &str) -> Vec<String> {
        vec!["kill".to_string(), name.to_string()]
    }

    async fn kill(&self, name: &str) -> Result<(), BackendError> {
        if self.failing_kills.iter().any(|n| n == name) {
            return Err(BackendError::Failed {
                command: format!("mock kill {}", name),
                stderr: "permission denied".to_string(),
            });
        }
        self.sessions.lock().unwrap().retain(|s| s.name != name);
        self.killed.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
