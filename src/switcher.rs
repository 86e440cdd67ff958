//! Handoff of the next session from an in-session picker to the shell that
//! regains the terminal after detach.
//!
//! One writer, one reader. The reader always deletes the file, and ignores
//! it once it is older than [`MAX_AGE`].

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::debug;

/// Targets older than this are discarded unread.
pub const MAX_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchAction {
    Attach,
    New,
}

/// Where to go once the current session has detached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub action: SwitchAction,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Target {
    pub fn attach(name: impl Into<String>) -> Self {
        Self {
            action: SwitchAction::Attach,
            name: name.into(),
            dir: None,
        }
    }

    pub fn new_session(name: impl Into<String>, dir: Option<PathBuf>) -> Self {
        Self {
            action: SwitchAction::New,
            name: name.into(),
            dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("no switch target at {}", .0.display())]
    Missing(PathBuf),
    #[error("switch target is stale (older than {}s)", MAX_AGE.as_secs())]
    Stale,
    #[error("switch target io: {0}")]
    Io(#[from] io::Error),
    #[error("malformed switch target: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The switch-target file.
#[derive(Debug, Clone)]
pub struct Switcher {
    path: PathBuf,
}

impl Switcher {
    /// `~/.cache/zpick/switch-target`
    pub fn from_env() -> Self {
        let path = dirs::home_dir()
            .unwrap_or_default()
            .join(".cache")
            .join("zpick")
            .join("switch-target");
        Self { path }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace any pending target with `target`.
    pub fn write(&self, target: &Target) -> Result<(), SwitchError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(target)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.path)?;
        file.write_all(&data)?;
        debug!("wrote switch target {:?} to {}", target, self.path.display());
        Ok(())
    }

    /// Read and delete the pending target.
    pub fn take(&self) -> Result<Target, SwitchError> {
        self.take_at(SystemTime::now())
    }

    fn take_at(&self, now: SystemTime) -> Result<Target, SwitchError> {
        let written = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SwitchError::Missing(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let age = now.duration_since(written).unwrap_or_default();
        if age >= MAX_AGE {
            self.discard();
            return Err(SwitchError::Stale);
        }

        let data = fs::read(&self.path);
        self.discard();
        Ok(serde_json::from_slice(&data?)?)
    }

    fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}
