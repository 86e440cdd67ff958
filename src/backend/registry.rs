use once_cell::sync::Lazy;
use std::io::Write;
use tracing::{debug, info};

use super::shpool::Shpool;
use super::tmux::Tmux;
use super::zellij::Zellij;
use super::zmosh::Zmosh;
use super::zmx::Zmx;
use super::{Backend, BackendError};
use crate::config::Config;
use crate::tty::{Key, Terminal, Tty};

/// Builds a backend from the settings it needs.
pub type Constructor = fn(&Config) -> Box<dyn Backend>;

static BUILTIN: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();
    registry.register("zmosh", |config| Box::new(Zmosh::new(config.transport())));
    registry.register("zmx", |_| Box::new(Zmx));
    registry.register("tmux", |_| Box::new(Tmux));
    registry.register("shpool", |_| Box::new(Shpool));
    registry.register("zellij", |_| Box::new(Zellij));
    registry
});

/// Name-keyed table of backend constructors, in probe order.
#[derive(Default)]
pub struct Registry {
    entries: Vec<(&'static str, Constructor)>,
}

impl Registry {
    /// The process-wide registry, populated on first use.
    pub fn global() -> &'static Registry {
        &BUILTIN
    }

    /// Add a constructor, replacing any previous one under the same name.
    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((name, constructor)),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    pub fn create(&self, name: &str, config: &Config) -> Result<Box<dyn Backend>, BackendError> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, constructor)| constructor(config))
            .ok_or_else(|| BackendError::Unknown {
                name: name.to_string(),
                valid: self.names().join(", "),
            })
    }

    /// Names of every backend that is usable right now.
    pub async fn detect(&self, config: &Config) -> Vec<&'static str> {
        let mut found = Vec::new();
        for (name, constructor) in &self.entries {
            match constructor(config).available().await {
                Ok(()) => found.push(*name),
                Err(e) => debug!("{} unavailable: {}", name, e),
            }
        }
        found
    }

    /// True when the caller is inside a session of any known backend.
    pub fn any_in_session(&self, config: &Config) -> bool {
        self.entries
            .iter()
            .any(|(_, constructor)| constructor(config).in_session())
    }
}

/// Pick the backend for this invocation.
///
/// A persisted preference wins. Otherwise a single available backend is
/// selected and persisted; several need an interactive choice.
pub async fn load(
    registry: &Registry,
    config: &Config,
    interactive: bool,
) -> Result<Box<dyn Backend>, BackendError> {
    if let Some(name) = config.backend_name()? {
        return registry.create(&name, config);
    }

    let available = registry.detect(config).await;
    match available.as_slice() {
        [] => Err(BackendError::NoneAvailable),
        [only] => {
            persist(config, only);
            registry.create(only, config)
        }
        many if !interactive => Err(BackendError::Ambiguous(many.join(", "))),
        many => {
            let mut tty = Tty::open().map_err(|e| {
                BackendError::Selection(format!("cannot open /dev/tty for backend selection: {}", e))
            })?;
            let name = prompt_choice(&mut tty, many)?;
            persist(config, name);
            let _ = writeln!(tty, "  Using {}\n", name);
            registry.create(name, config)
        }
    }
}

/// Validate and persist an explicit backend choice.
pub fn select(registry: &Registry, config: &Config, name: &str) -> Result<(), BackendError> {
    registry.create(name, config)?;
    config.set_backend_name(name)?;
    Ok(())
}

fn persist(config: &Config, name: &str) {
    match config.set_backend_name(name) {
        Ok(()) => info!("selected backend {}", name),
        Err(e) => debug!("could not persist backend {}: {}", name, e),
    }
}

/// Numbered single-keypress choice between backends.
fn prompt_choice<'a, T: Terminal>(
    term: &mut T,
    choices: &[&'a str],
) -> Result<&'a str, BackendError> {
    let io_err = |e: std::io::Error| BackendError::Selection(format!("backend selection: {}", e));

    write!(term, "\n  Multiple session managers found. Pick one:\n\n").map_err(io_err)?;
    for (i, name) in choices.iter().enumerate() {
        writeln!(term, "    {}) {}", i + 1, name).map_err(io_err)?;
    }
    write!(term, "\n  > ").map_err(io_err)?;

    let key = term.read_key().map_err(io_err)?;
    let _ = writeln!(term);

    match key {
        Key::Char(c) => c
            .to_digit(10)
            .map(|d| d as usize)
            .filter(|d| (1..=choices.len()).contains(d))
            .map(|d| choices[d - 1])
            .ok_or_else(|| BackendError::Selection("invalid selection".to_string())),
        _ => Err(BackendError::Selection("no selection made".to_string())),
    }
}
