//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Session launcher for zmosh, zmx, tmux, shpool and zellij.
///
/// Without a subcommand, shows the picker and prints shell code for the
/// calling shell to evaluate.
#[derive(Debug, Parser)]
#[command(name = "zp", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List sessions of the selected backend.
    List {
        /// Machine-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Attach to a session, creating it if needed.
    Attach {
        name: String,

        /// Directory to start a new session in.
        #[arg(long, value_name = "PATH")]
        dir: Option<PathBuf>,
    },

    /// Kill a session.
    Kill { name: String },

    /// Prompt before a guarded command, or manage the guarded apps.
    Guard(GuardArgs),

    /// Run the command handed over by the guard prompt.
    Autorun,

    /// Print the attach command left behind by an in-session pick.
    Switch,

    /// Show the selected backend, or select one.
    Backend { name: Option<String> },

    /// Print the version.
    Version,
}

#[derive(Debug, clap::Args)]
pub struct GuardArgs {
    /// Add an app to the guard list.
    #[arg(long, value_name = "APP", conflicts_with_all = ["remove", "list", "argv"])]
    pub add: Option<String>,

    /// Remove an app from the guard list.
    #[arg(long, value_name = "APP", conflicts_with_all = ["list", "argv"])]
    pub remove: Option<String>,

    /// Print the guarded apps.
    #[arg(long, conflicts_with = "argv")]
    pub list: bool,

    /// The guarded command line, after `--`.
    #[arg(last = true, value_name = "COMMAND")]
    pub argv: Vec<String>,
}
