//! Prompt shown before a guarded command runs outside any session.

mod argv;

pub use argv::{autorun, encode_argv, AUTORUN_VAR};

use anyhow::Result;
use crossterm::style::{style, Color, Stylize};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::backend::{Backend, Registry};
use crate::config::Config;
use crate::picker::Picker;
use crate::tty::{self, Key, RawModeGuard, Tty};

/// How long the prompt waits for a key before letting the command through.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of the guard prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Open the picker
    Enter,
    /// Any other key, or a failed read
    Dismissed,
    TimedOut,
}

impl From<Key> for Response {
    fn from(key: Key) -> Self {
        match key {
            Key::Enter => Response::Enter,
            _ => Response::Dismissed,
        }
    }
}

/// Race one blocking key read against `timeout`.
///
/// The read runs on its own thread. When the timer wins, that thread is left
/// behind and its result is dropped.
pub async fn race_key<F>(read: F, timeout: Duration) -> Response
where
    F: FnOnce() -> io::Result<Key> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(read());
    });

    tokio::select! {
        result = rx => match result {
            Ok(Ok(key)) => Response::from(key),
            Ok(Err(e)) => {
                debug!("guard key read failed: {}", e);
                Response::Dismissed
            }
            Err(_) => Response::Dismissed,
        },
        _ = tokio::time::sleep(timeout) => Response::TimedOut,
    }
}

/// Offer the picker before `argv` runs.
///
/// Returns shell code for the caller to evaluate, or `None` to let the
/// original command through untouched.
pub async fn run(
    registry: &Registry,
    config: &Config,
    backend: Box<dyn Backend>,
    argv: &[String],
) -> Result<Option<String>> {
    if registry.any_in_session(config) {
        debug!("inside a session, guard skipped");
        return Ok(None);
    }
    let mut term = match Tty::open() {
        Ok(term) => term,
        Err(e) => {
            debug!("no controlling terminal: {}", e);
            return Ok(None);
        }
    };

    prompt(&mut term, backend.name())?;
    let response = match RawModeGuard::acquire() {
        Ok(_raw) => race_key(tty::next_key, PROMPT_TIMEOUT).await,
        Err(e) => {
            debug!("cannot enter raw mode: {}", e);
            Response::Dismissed
        }
    };
    write!(term, "\r\n")?;
    info!("guard prompt for {:?}: {:?}", argv.first(), response);

    if response != Response::Enter {
        return Ok(None);
    }

    let mut picker = Picker::new(backend, registry, config);
    match picker.run(&mut term).await? {
        Some(command) => Ok(Some(with_autorun(&mut term, argv, command)?)),
        None => Ok(None),
    }
}

fn prompt<W: Write>(out: &mut W, backend: &str) -> io::Result<()> {
    write!(
        out,
        "\n  {} Not in a {} session. Press {} to pick one ({}s)  {}\n  {} ",
        style("!").with(Color::Yellow).bold(),
        backend,
        "ENTER".bold(),
        PROMPT_TIMEOUT.as_secs(),
        "esc skip".dim(),
        style(">").with(Color::Yellow).bold()
    )?;
    out.flush()
}

/// Prefix `command` so the shell re-runs `argv` inside the new session.
fn with_autorun<W: Write>(out: &mut W, argv: &[String], command: String) -> Result<String> {
    if argv.is_empty() {
        return Ok(command);
    }
    let encoded = encode_argv(argv)?;
    writeln!(out, "  {} {}", "run:".dim(), argv.join(" "))?;
    Ok(format!("export {}={}; {}", AUTORUN_VAR, encoded, command))
}
