//! Controlling-terminal access for the interactive prompts.
//!
//! All interactive output goes to `/dev/tty` so that stdout stays free for
//! the shell code the caller evaluates.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// A single decoded keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    /// Ctrl-C
    Interrupt,
    Backspace,
    Char(char),
    Other,
}

impl Key {
    /// Escape and Ctrl-C both cancel whatever prompt is open.
    pub fn is_cancel(self) -> bool {
        matches!(self, Key::Escape | Key::Interrupt)
    }
}

impl From<KeyEvent> for Key {
    fn from(key: KeyEvent) -> Self {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Escape,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Char(c) => Key::Char(c),
            _ => Key::Other,
        }
    }
}

/// Interactive surface the picker and selection prompts talk to.
pub trait Terminal: Write {
    /// Read exactly one keypress.
    fn read_key(&mut self) -> io::Result<Key>;

    /// Read a freeform line; `None` when the user cancels.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Run the external directory chooser. Any failure means no selection.
    fn pick_directory(&mut self) -> Option<PathBuf>;
}

/// Raw mode lifetime guard so terminal state is restored on any return path.
pub struct RawModeGuard;

impl RawModeGuard {
    /// Enable terminal raw mode and return a guard that disables it on drop.
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Block until the next key press. The caller owns the raw-mode scope.
pub fn next_key() -> io::Result<Key> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(Key::from(key));
            }
        }
    }
}

/// Line editing over a key source: backspace edits, Enter submits,
/// Escape or Ctrl-C cancels. Typed characters are echoed to `out`.
pub fn edit_line<W, F>(out: &mut W, mut next: F) -> io::Result<Option<String>>
where
    W: Write,
    F: FnMut() -> io::Result<Key>,
{
    let mut buffer = String::new();
    loop {
        match next()? {
            Key::Enter => {
                write!(out, "\r\n")?;
                out.flush()?;
                return Ok(Some(buffer));
            }
            key if key.is_cancel() => {
                write!(out, "\r\n")?;
                out.flush()?;
                return Ok(None);
            }
            Key::Backspace => {
                if buffer.pop().is_some() {
                    write!(out, "\x08 \x08")?;
                }
            }
            Key::Char(c) if !c.is_control() => {
                buffer.push(c);
                write!(out, "{}", c)?;
            }
            _ => {}
        }
        out.flush()?;
    }
}

/// Handle to the controlling terminal.
pub struct Tty {
    file: File,
}

impl Tty {
    pub fn open() -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open("/dev/tty")?;
        Ok(Self { file })
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Terminal for Tty {
    fn read_key(&mut self) -> io::Result<Key> {
        self.flush()?;
        let _guard = RawModeGuard::acquire()?;
        next_key()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.flush()?;
        let _guard = RawModeGuard::acquire()?;
        edit_line(&mut self.file, next_key)
    }

    fn pick_directory(&mut self) -> Option<PathBuf> {
        let zoxide = match which::which("zoxide") {
            Ok(path) => path,
            Err(_) => {
                let _ = writeln!(self, "  zoxide not installed");
                return None;
            }
        };
        let _ = writeln!(self);

        let stdin = self.file.try_clone().ok()?;
        let stderr = self.file.try_clone().ok()?;
        let output = Command::new(zoxide)
            .args(["query", "-i"])
            .stdin(Stdio::from(stdin))
            .stderr(Stdio::from(stderr))
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!dir.is_empty()).then(|| PathBuf::from(dir))
            }
            Ok(output) => {
                debug!("zoxide exited with {}", output.status);
                None
            }
            Err(e) => {
                debug!("zoxide failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn edit(keys: &[Key]) -> (Option<String>, String) {
        let mut queue: VecDeque<Key> = keys.iter().copied().collect();
        let mut out = Vec::new();
        let line = edit_line(&mut out, || {
            queue
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more keys"))
        })
        .unwrap();
        (line, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_edit_line_submit() {
        let (line, echo) = edit(&[Key::Char('a'), Key::Char('b'), Key::Enter]);
        assert_eq!(line.as_deref(), Some("ab"));
        assert!(echo.starts_with("ab"));
    }

    #[test]
    fn test_edit_line_backspace() {
        let (line, _) = edit(&[
            Key::Char('a'),
            Key::Char('x'),
            Key::Backspace,
            Key::Char('b'),
            Key::Enter,
        ]);
        assert_eq!(line.as_deref(), Some("ab"));
    }

    #[test]
    fn test_edit_line_backspace_on_empty_is_noop() {
        let (line, echo) = edit(&[Key::Backspace, Key::Char('z'), Key::Enter]);
        assert_eq!(line.as_deref(), Some("z"));
        assert!(!echo.contains('\x08'));
    }

    #[test]
    fn test_edit_line_cancel() {
        assert_eq!(edit(&[Key::Char('a'), Key::Escape]).0, None);
        assert_eq!(edit(&[Key::Char('a'), Key::Interrupt]).0, None);
    }

    #[test]
    fn test_key_from_event() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Key::from(ctrl_c), Key::Interrupt);

        let plain_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(Key::from(plain_c), Key::Char('c'));

        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(Key::from(enter), Key::Enter);
    }
}
