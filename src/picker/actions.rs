use super::keys::{index_for_key, MAX_SESSIONS};
use crate::session::Session;
use crate::tty::Key;

/// What a keypress on the main picker screen asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Attach to a listed session
    Attach(String),
    /// New session named after the working directory
    New,
    /// Same as `New`, with a date suffix
    NewDate,
    /// Freeform name
    Custom,
    /// New session in a directory chosen with zoxide
    PickDirectory,
    /// Choose a session (or all) to kill
    KillSelect,
    /// Help and settings screen
    Help,
    /// Leave without doing anything
    Escape,
}

impl Action {
    pub fn from_key(key: Key, sessions: &[Session]) -> Self {
        match key {
            Key::Enter => Action::New,
            Key::Char('c') => Action::Custom,
            Key::Char('z') => Action::PickDirectory,
            Key::Char('d') => Action::NewDate,
            Key::Char('k') => Action::KillSelect,
            Key::Char('h') => Action::Help,
            Key::Char(c) => session_for_key(c, sessions)
                .map(|s| Action::Attach(s.name.clone()))
                .unwrap_or(Action::Escape),
            _ => Action::Escape,
        }
    }
}

/// The listed session bound to hotkey `c`, if any.
pub fn session_for_key(c: char, sessions: &[Session]) -> Option<&Session> {
    index_for_key(c)
        .filter(|&i| i < MAX_SESSIONS)
        .and_then(|i| sessions.get(i))
}
