use crossterm::style::{style, Color, StyledContent, Stylize};
use crossterm::{cursor, queue, terminal};
use std::fmt::Display;
use std::io::{self, Write};
use std::path::Path;

use super::keys::{key_for_index, MAX_SESSIONS};
use crate::session::Session;

/// Widest a session's start directory is shown before it gets shortened.
const PATH_WIDTH: usize = 40;

/// Picker colors
pub struct Theme {
    pub accent: Color,
    pub key: Color,
    pub name: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Cyan,
            key: Color::Yellow,
            name: Color::White,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }
}

impl Theme {
    fn key<D: Display>(&self, key: D) -> StyledContent<D> {
        style(key).with(self.key).bold()
    }

    fn name<D: Display>(&self, name: D) -> StyledContent<D> {
        style(name).with(self.name).bold()
    }

    fn accent<D: Display>(&self, text: D) -> StyledContent<D> {
        style(text).with(self.accent).bold()
    }
}

/// The main picker screen, ending at the `>` prompt.
pub fn picker<W: Write>(
    out: &mut W,
    theme: &Theme,
    backend: &str,
    sessions: &[Session],
    current: Option<&str>,
    default_name: &str,
) -> io::Result<()> {
    writeln!(out)?;
    if sessions.is_empty() {
        writeln!(out, "  {} {}\n", theme.accent(backend), "no sessions".dim())?;
    } else {
        let count = match sessions.len() {
            1 => "1 session".to_string(),
            n => format!("{} sessions", n),
        };
        writeln!(out, "  {} {}\n", theme.accent(backend), count.dim())?;
        session_list(out, theme, sessions, current)?;
        writeln!(out)?;
    }

    writeln!(
        out,
        "  {} {} {}",
        style("enter").with(theme.success).bold(),
        "new".dim(),
        theme.name(default_name)
    )?;
    let actions = [
        ("c", "custom"),
        ("z", "pick dir"),
        ("d", "+date"),
        ("k", "kill"),
        ("h", "help"),
        ("esc", "skip"),
    ];
    write!(out, " ")?;
    for (key, label) in actions {
        write!(out, " {} {} ", theme.key(key), label.dim())?;
    }
    writeln!(out, "\n")?;
    prompt(out, theme)
}

/// Numbered rows for every session that has a hotkey.
pub fn session_list<W: Write>(
    out: &mut W,
    theme: &Theme,
    sessions: &[Session],
    current: Option<&str>,
) -> io::Result<()> {
    for (i, session) in sessions.iter().take(MAX_SESSIONS).enumerate() {
        let key = key_for_index(i).unwrap_or(' ');
        let indicator = if session.active {
            style("*").with(theme.success).bold()
        } else {
            style(".").dim()
        };
        let marker = if current == Some(session.name.as_str()) {
            " (current)"
        } else {
            ""
        };
        writeln!(
            out,
            "  {}  {} {} {}{}",
            theme.key(key),
            theme.name(&session.name),
            indicator,
            truncate_path(&session.started_in, PATH_WIDTH).dim(),
            marker.dim()
        )?;
    }
    if sessions.len() > MAX_SESSIONS {
        let hidden = sessions.len() - MAX_SESSIONS;
        writeln!(out, "  {}", format!("... {} more", hidden).dim())?;
    }
    Ok(())
}

pub fn prompt<W: Write>(out: &mut W, theme: &Theme) -> io::Result<()> {
    write!(out, "  {} ", theme.accent(">"))?;
    out.flush()
}

pub fn chosen<W: Write>(
    out: &mut W,
    theme: &Theme,
    name: &str,
    dir: Option<&Path>,
) -> io::Result<()> {
    match dir {
        Some(dir) => writeln!(
            out,
            "  {} {} {}",
            style("->").with(theme.success),
            theme.name(name),
            format!("in {}", dir.display()).dim()
        ),
        None => writeln!(out, "  {} {}", style("->").with(theme.success), theme.name(name)),
    }
}

pub fn custom_prompt<W: Write>(out: &mut W, theme: &Theme) -> io::Result<()> {
    write!(out, "  {} {} ", "name:".dim(), theme.accent(">"))?;
    out.flush()
}

pub fn custom_menu<W: Write>(out: &mut W, theme: &Theme, name: &str) -> io::Result<()> {
    writeln!(
        out,
        "\n  {} {} {}  {} {}  {} {}\n",
        theme.name(name),
        theme.key("enter"),
        "create here".dim(),
        theme.key("z"),
        "pick dir".dim(),
        theme.key("esc"),
        "cancel".dim()
    )?;
    prompt(out, theme)
}

pub fn kill_prompt<W: Write>(out: &mut W, theme: &Theme) -> io::Result<()> {
    writeln!(
        out,
        "\n  {} {}  {} {}  {} {}\n",
        theme.key("1-y"),
        "kill one".dim(),
        theme.key("c"),
        "kill all".dim(),
        theme.key("esc"),
        "cancel".dim()
    )?;
    prompt(out, theme)
}

pub fn confirm<W: Write>(out: &mut W, theme: &Theme, question: &str) -> io::Result<()> {
    write!(
        out,
        "  {} {} ",
        style(question).with(theme.warning).bold(),
        "[y/N]".dim()
    )?;
    out.flush()
}

pub fn killed<W: Write>(out: &mut W, theme: &Theme, name: &str) -> io::Result<()> {
    writeln!(out, "  {} {}", style("killed").with(theme.success), theme.name(name))
}

pub fn kill_failed<W: Write, E: Display>(
    out: &mut W,
    theme: &Theme,
    name: &str,
    err: E,
) -> io::Result<()> {
    writeln!(
        out,
        "  {} {}: {}",
        style("failed to kill").with(theme.error).bold(),
        theme.name(name),
        err
    )
}

/// A setting change that did not take; the picker keeps running.
pub fn failed<W: Write, E: Display>(out: &mut W, theme: &Theme, err: E) -> io::Result<()> {
    writeln!(out, "  {} {}", style("failed:").with(theme.error).bold(), err)
}

pub fn note<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    writeln!(out, "  {}", text.dim())
}

/// Shown when the selected backend cannot be used, instead of an error.
pub fn unavailable<W: Write, E: Display>(
    out: &mut W,
    theme: &Theme,
    binary: &str,
    err: E,
) -> io::Result<()> {
    writeln!(
        out,
        "\n  {} {} ({})",
        style("zp:").with(theme.error).bold(),
        format!("{} is not usable", binary).bold(),
        err
    )?;
    writeln!(
        out,
        "  {}\n",
        "Install it, or run 'zp backend <name>' to pick another session manager.".dim()
    )
}

/// Settings shown on the help screen.
pub struct HelpView<'a> {
    pub backend: &'a str,
    pub available: &'a [&'static str],
    pub config_dir: &'a Path,
    pub guard_apps: &'a [String],
    pub transport: Option<TransportView<'a>>,
    pub version: &'a str,
}

pub struct TransportView<'a> {
    pub enabled: bool,
    pub host: Option<&'a str>,
}

pub fn help<W: Write>(out: &mut W, theme: &Theme, view: &HelpView<'_>) -> io::Result<()> {
    queue!(
        out,
        terminal::Clear(terminal::ClearType::All),
        cursor::MoveTo(0, 0)
    )?;

    writeln!(out, "\n  {} {}\n", theme.accent("zp"), view.version.dim())?;
    writeln!(out, "  {}", "keys".bold())?;
    let keys = [
        ("1-9 a-y", "attach to a listed session"),
        ("enter", "new session named after this directory"),
        ("c", "new session with a custom name"),
        ("z", "new session in a zoxide directory"),
        ("d", "new session with today's date"),
        ("k", "kill one or all sessions"),
        ("esc", "leave"),
    ];
    for (key, what) in keys {
        writeln!(out, "    {:<10} {}", theme.key(key), what.dim())?;
    }

    writeln!(out, "\n  {} {}\n", "config".bold(), view.config_dir.display().to_string().dim())?;

    let others = view.available.join(", ");
    writeln!(
        out,
        "  {}  {:<8} {} {}",
        theme.key("b"),
        "backend",
        theme.name(view.backend),
        format!("[{}]", others).dim()
    )?;

    let apps = if view.guard_apps.is_empty() {
        "none".to_string()
    } else {
        view.guard_apps.join(", ")
    };
    writeln!(out, "  {}  {:<8} {}", style(".").dim(), "guard", apps)?;
    writeln!(
        out,
        "     {}",
        "manage with: zp guard --add <app> | --remove <app> | --list".dim()
    )?;

    match &view.transport {
        Some(transport) => {
            let state = match (transport.enabled, transport.host) {
                (true, Some(host)) => format!("on ({})", host),
                (true, None) => "on".to_string(),
                (false, _) => "off".to_string(),
            };
            writeln!(out, "  {}  {:<8} {}", theme.key("u"), "udp", state)?;
        }
        None => writeln!(
            out,
            "  {}  {:<8} {}",
            style(".").dim(),
            "udp",
            "(zmosh only)".dim()
        )?,
    }

    writeln!(out, "\n  {} {}\n", theme.key("esc"), "back".dim())?;
    prompt(out, theme)
}

/// Shorten long paths to their last three components.
pub fn truncate_path(path: &str, max: usize) -> String {
    let home = dirs::home_dir().map(|h| h.to_string_lossy().into_owned());
    truncate_path_with(path, home.as_deref(), max)
}

fn truncate_path_with(path: &str, home: Option<&str>, max: usize) -> String {
    let under_home = home
        .filter(|home| !home.is_empty())
        .and_then(|home| path.strip_prefix(home))
        .filter(|rest| rest.is_empty() || rest.starts_with('/'));
    let path = match under_home {
        Some(rest) => format!("~{}", rest),
        None => path.to_string(),
    };
    if path.chars().count() <= max {
        return path;
    }

    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 4 {
        return path;
    }
    let tail = parts[parts.len() - 3..].join("/");
    if path.starts_with('~') {
        format!("~/.../{}", tail)
    } else {
        format!(".../{}", tail)
    }
}
