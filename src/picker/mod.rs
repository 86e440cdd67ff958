//! Single-keypress session picker.
//!
//! The picker talks to the user over a [`Terminal`] and returns the shell
//! command the caller should evaluate, or `None` to leave the shell as is.

mod actions;
mod keys;
mod naming;
mod render;

#[cfg(test)]
pub mod testing;

use actions::Action;
use naming::{counter_name, date_name};

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::backend::{env_non_empty, launch_command, Backend, Registry};
use crate::config::{Config, Transport};
use crate::session::Session;
use crate::switcher::{Switcher, Target};
use crate::tty::{Key, Terminal};
use render::{HelpView, Theme, TransportView};

/// Set to allow the picker inside an existing session (switch mode).
pub const NESTED_VAR: &str = "ZPICK";
/// Set to `1` to skip kill confirmations.
pub const NO_CONFIRM_VAR: &str = "ZPICK_NO_CONFIRM";

pub struct Picker<'a> {
    backend: Box<dyn Backend>,
    registry: &'a Registry,
    config: &'a Config,
    switcher: Switcher,
    cwd: PathBuf,
    allow_nested: bool,
    confirm_kills: bool,
    theme: Theme,
}

impl<'a> Picker<'a> {
    pub fn new(backend: Box<dyn Backend>, registry: &'a Registry, config: &'a Config) -> Self {
        Self {
            backend,
            registry,
            config,
            switcher: Switcher::from_env(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            allow_nested: env_non_empty(NESTED_VAR).is_some(),
            confirm_kills: std::env::var(NO_CONFIRM_VAR).map_or(true, |v| v != "1"),
            theme: Theme::default(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_switcher(mut self, switcher: Switcher) -> Self {
        self.switcher = switcher;
        self
    }

    pub fn allow_nested(mut self, allow: bool) -> Self {
        self.allow_nested = allow;
        self
    }

    pub fn confirm_kills(mut self, confirm: bool) -> Self {
        self.confirm_kills = confirm;
        self
    }

    /// Inside a session, picks are handed over through the switch target.
    fn switching(&self) -> bool {
        self.backend.in_session()
    }

    /// Show the picker until the user chooses something or leaves.
    pub async fn run<T: Terminal>(&mut self, term: &mut T) -> Result<Option<String>> {
        if self.backend.in_session() && !self.allow_nested {
            debug!("already inside a {} session", self.backend.name());
            return Ok(None);
        }
        if let Err(e) = self.backend.available().await {
            render::unavailable(term, &self.theme, self.backend.binary_name(), &e)?;
            return Ok(None);
        }

        loop {
            let sessions = self
                .backend
                .fast_list()
                .await
                .with_context(|| format!("failed to list {} sessions", self.backend.name()))?;
            let current = if self.switching() {
                self.backend.current_session()
            } else {
                None
            };
            let default_name = counter_name(&self.cwd, &sessions);

            render::picker(
                term,
                &self.theme,
                self.backend.name(),
                &sessions,
                current.as_deref(),
                &default_name,
            )?;
            let key = term.read_key()?;
            writeln!(term)?;

            match Action::from_key(key, &sessions) {
                Action::Attach(name) => return self.finish(term, Target::attach(name)).map(Some),
                Action::New => {
                    return self
                        .finish(term, Target::new_session(default_name, None))
                        .map(Some)
                }
                Action::NewDate => {
                    let name = date_name(&self.cwd);
                    return self.finish(term, Target::new_session(name, None)).map(Some);
                }
                Action::Custom => return self.custom(term),
                Action::PickDirectory => {
                    if let Some(dir) = term.pick_directory() {
                        let name = counter_name(&dir, &sessions);
                        return self
                            .finish(term, Target::new_session(name, Some(dir)))
                            .map(Some);
                    }
                }
                Action::KillSelect => self.kill_select(term, &sessions).await?,
                Action::Help => self.help(term).await?,
                Action::Escape => return Ok(None),
            }
        }
    }

    /// Turn a chosen target into the command for the caller's shell.
    fn finish<T: Terminal>(&self, term: &mut T, target: Target) -> Result<String> {
        render::chosen(term, &self.theme, &target.name, target.dir.as_deref())?;
        info!("picked {:?}", target);

        if self.switching() {
            self.switcher
                .write(&target)
                .context("failed to record switch target")?;
            return Ok(self.backend.detach_command());
        }
        Ok(launch_command(
            self.backend.as_ref(),
            &target.name,
            target.dir.as_deref(),
        ))
    }

    /// Freeform name, then create here or in a zoxide directory.
    fn custom<T: Terminal>(&self, term: &mut T) -> Result<Option<String>> {
        render::custom_prompt(term, &self.theme)?;
        let name = match term.read_line()? {
            Some(line) if !line.trim().is_empty() => line.trim().to_string(),
            _ => return Ok(None),
        };

        render::custom_menu(term, &self.theme, &name)?;
        let key = term.read_key()?;
        writeln!(term)?;
        match key {
            Key::Enter => self.finish(term, Target::new_session(name, None)).map(Some),
            Key::Char('z') => match term.pick_directory() {
                Some(dir) => self
                    .finish(term, Target::new_session(name, Some(dir)))
                    .map(Some),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    async fn kill_select<T: Terminal>(&self, term: &mut T, sessions: &[Session]) -> Result<()> {
        if sessions.is_empty() {
            render::note(term, "no sessions to kill")?;
            return Ok(());
        }

        writeln!(term)?;
        render::session_list(term, &self.theme, sessions, None)?;
        render::kill_prompt(term, &self.theme)?;
        let key = term.read_key()?;
        writeln!(term)?;

        match key {
            Key::Char('c' | 'C') => {
                let question = format!("kill all {} sessions?", sessions.len());
                if self.confirm(term, &question)? {
                    for session in sessions {
                        self.kill_one(term, &session.name).await?;
                    }
                }
            }
            Key::Char(c) => match actions::session_for_key(c, sessions) {
                Some(session) => {
                    if self.confirm(term, &format!("kill {}?", session.name))? {
                        self.kill_one(term, &session.name).await?;
                    }
                }
                None => render::note(term, "cancelled")?,
            },
            _ => render::note(term, "cancelled")?,
        }
        Ok(())
    }

    /// Kill one session and report the outcome. Failures are not fatal.
    async fn kill_one<T: Terminal>(&self, term: &mut T, name: &str) -> Result<()> {
        match self.backend.kill(name).await {
            Ok(()) => {
                info!("killed session {}", name);
                render::killed(term, &self.theme, name)?;
            }
            Err(e) => {
                warn!("failed to kill session {}: {}", name, e);
                render::kill_failed(term, &self.theme, name, &e)?;
            }
        }
        Ok(())
    }

    fn confirm<T: Terminal>(&self, term: &mut T, question: &str) -> Result<bool> {
        if !self.confirm_kills {
            return Ok(true);
        }
        render::confirm(term, &self.theme, question)?;
        let key = term.read_key()?;
        writeln!(term)?;
        if matches!(key, Key::Char('y' | 'Y')) {
            return Ok(true);
        }
        render::note(term, "cancelled")?;
        Ok(false)
    }

    /// Help screen. `b` cycles the backend, `u` toggles the transport.
    async fn help<T: Terminal>(&mut self, term: &mut T) -> Result<()> {
        loop {
            let available = self.registry.detect(self.config).await;
            let guard_apps = self.config.guard_apps().unwrap_or_else(|e| {
                debug!("cannot read guard list: {}", e);
                Vec::new()
            });
            let view = HelpView {
                backend: self.backend.name(),
                available: &available,
                config_dir: self.config.dir(),
                guard_apps: &guard_apps,
                transport: self.backend.transport().map(|t| TransportView {
                    enabled: t.enabled,
                    host: t.host.as_deref(),
                }),
                version: env!("CARGO_PKG_VERSION"),
            };
            render::help(term, &self.theme, &view)?;

            let key = term.read_key()?;
            writeln!(term)?;
            match key {
                k if k.is_cancel() => return Ok(()),
                Key::Char('b') => self.cycle_backend(term, &available)?,
                Key::Char('u') => self.toggle_transport(term)?,
                _ => {}
            }
        }
    }

    fn cycle_backend<T: Terminal>(&mut self, term: &mut T, available: &[&str]) -> Result<()> {
        if available.len() < 2 {
            render::note(term, "no other backend available")?;
            return Ok(());
        }
        let next = available
            .iter()
            .position(|name| *name == self.backend.name())
            .map_or(0, |i| (i + 1) % available.len());
        let name = available[next];

        match self.switch_backend(name) {
            Ok(backend) => {
                self.backend = backend;
                info!("switched backend to {}", name);
            }
            Err(e) => {
                warn!("cannot switch backend to {}: {:#}", name, e);
                render::failed(term, &self.theme, format_args!("{:#}", e))?;
            }
        }
        Ok(())
    }

    fn switch_backend(&self, name: &str) -> Result<Box<dyn Backend>> {
        self.config.set_backend_name(name)?;
        Ok(self.registry.create(name, self.config)?)
    }

    fn toggle_transport<T: Terminal>(&mut self, term: &mut T) -> Result<()> {
        let Some(transport) = self.backend.transport() else {
            render::note(term, "udp is only available for zmosh")?;
            return Ok(());
        };
        let mut transport = transport.clone();
        transport.enabled = !transport.enabled;

        match self.apply_transport(&transport) {
            Ok(backend) => {
                self.backend = backend;
                info!("udp transport {}", if transport.enabled { "on" } else { "off" });
            }
            Err(e) => {
                warn!("cannot save udp transport: {:#}", e);
                render::failed(term, &self.theme, format_args!("{:#}", e))?;
            }
        }
        Ok(())
    }

    fn apply_transport(&self, transport: &Transport) -> Result<Box<dyn Backend>> {
        self.config.set_transport(transport)?;
        Ok(self.registry.create(self.backend.name(), self.config)?)
    }
}
