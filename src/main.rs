use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod config;
mod guard;
mod picker;
mod session;
mod switcher;
mod tty;

use backend::{launch_command, Backend, Registry};
use cli::{Args, Command, GuardArgs};
use config::Config;
use picker::Picker;
use session::Session;
use switcher::Switcher;
use tty::Tty;

/// Log filter variable; logs go to stderr, never stdout.
const LOG_VAR: &str = "ZPICK_LOG";

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("zp: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env();
    let registry = Registry::global();

    match args.command {
        None => run_picker(registry, &config).await,
        Some(Command::List { json }) => run_list(registry, &config, json).await,
        Some(Command::Attach { name, dir }) => {
            let backend = backend::load(registry, &config, true).await?;
            if let Some(dir) = dir {
                std::env::set_current_dir(&dir)
                    .with_context(|| format!("cannot change to {}", dir.display()))?;
            }
            match backend.attach(&name) {
                Ok(never) => match never {},
                Err(e) => Err(e).with_context(|| format!("failed to attach to {}", name)),
            }
        }
        Some(Command::Kill { name }) => {
            let backend = backend::load(registry, &config, true).await?;
            backend
                .kill(&name)
                .await
                .with_context(|| format!("failed to kill {}", name))
        }
        Some(Command::Guard(guard_args)) => run_guard(registry, &config, guard_args).await,
        Some(Command::Autorun) => guard::autorun(),
        Some(Command::Switch) => {
            run_switch(registry, &config).await;
            Ok(())
        }
        Some(Command::Backend { name }) => run_backend(registry, &config, name).await,
        Some(Command::Version) => {
            println!("zp {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_picker(registry: &Registry, config: &Config) -> Result<()> {
    let backend = backend::load(registry, config, true).await?;
    let mut tty = Tty::open().map_err(tty_unavailable)?;

    let mut picker = Picker::new(backend, registry, config);
    if let Some(command) = picker.run(&mut tty).await? {
        print!("{}", command);
    }
    Ok(())
}

fn tty_unavailable(e: io::Error) -> anyhow::Error {
    anyhow!(
        "cannot open /dev/tty: {}\n  run zp from an interactive terminal",
        e
    )
}

/// JSON shape of `zp list --json`. Fields are only ever added.
#[derive(Debug, Serialize)]
struct ListResult {
    sessions: Vec<Session>,
    count: usize,
    /// Same as `backend_version` for zmosh and zmx
    #[serde(skip_serializing_if = "Option::is_none")]
    zmosh_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_version: Option<String>,
}

impl ListResult {
    async fn collect(backend: &dyn Backend) -> Result<Self> {
        let sessions = backend.list().await?;
        let backend_version = match backend.version().await {
            Ok(version) => Some(version),
            Err(e) => {
                debug!("no {} version: {}", backend.name(), e);
                None
            }
        };
        let zmosh_version = backend_version
            .clone()
            .filter(|_| matches!(backend.name(), "zmosh" | "zmx"));

        Ok(Self {
            count: sessions.len(),
            sessions,
            zmosh_version,
            backend_version,
        })
    }
}

async fn run_list(registry: &Registry, config: &Config, json: bool) -> Result<()> {
    let backend = backend::load(registry, config, !json).await?;

    if json {
        let result = ListResult::collect(backend.as_ref()).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let sessions = backend.list().await?;
    if sessions.is_empty() {
        println!("  no sessions");
        return Ok(());
    }
    for session in &sessions {
        println!("{}", format_session(session));
    }
    Ok(())
}

fn format_session(session: &Session) -> String {
    let status = if session.active { "*" } else { "." };
    format!(
        "  {}{}  ({} clients)  {}",
        status, session.name, session.clients, session.started_in
    )
}

async fn run_guard(registry: &Registry, config: &Config, args: GuardArgs) -> Result<()> {
    if let Some(app) = args.add {
        config.add_guard_app(&app)?;
        eprintln!("  added {:?} to guard list", app);
        return Ok(());
    }
    if let Some(app) = args.remove {
        config.remove_guard_app(&app)?;
        eprintln!("  removed {:?} from guard list", app);
        return Ok(());
    }
    if args.list {
        for app in config.guard_apps()? {
            println!("{}", app);
        }
        return Ok(());
    }

    let backend = backend::load(registry, config, true).await?;
    if let Some(command) = guard::run(registry, config, backend, &args.argv).await? {
        print!("{}", command);
    }
    Ok(())
}

/// Consume a pending switch target. Runs from a shell hook, so it never
/// reports errors.
async fn run_switch(registry: &Registry, config: &Config) {
    let target = match Switcher::from_env().take() {
        Ok(target) => target,
        Err(e) => {
            debug!("no switch: {}", e);
            return;
        }
    };
    let backend = match backend::load(registry, config, false).await {
        Ok(backend) => backend,
        Err(e) => {
            debug!("cannot switch to {}: {}", target.name, e);
            return;
        }
    };
    debug!("switching to {:?}", target);
    print!(
        "{}",
        launch_command(backend.as_ref(), &target.name, target.dir.as_deref())
    );
}

async fn run_backend(registry: &Registry, config: &Config, name: Option<String>) -> Result<()> {
    match name {
        Some(name) => {
            backend::select(registry, config, &name)?;
            eprintln!("  using {}", name);
        }
        None => match config.backend_name()? {
            Some(name) => println!("{}", name),
            None => {
                let available = registry.detect(config).await;
                eprintln!(
                    "  no backend selected (available: {})",
                    if available.is_empty() {
                        "none".to_string()
                    } else {
                        available.join(", ")
                    }
                );
            }
        },
    }
    Ok(())
}
