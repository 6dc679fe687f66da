//! anvil-auth-replay - Main entry point.
//!
//! Replays a scripted timeline of host events (joins, text-field snapshots,
//! slot clicks, closes, backend logins) through the dialog engine, with a
//! console host standing in for the game server and the in-memory account
//! store standing in for the login plugin.
//!
//! Useful for checking a configuration file: menus, messages, delays and
//! actions all behave as they would on a live server, and every rendering
//! request shows up in the log.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};

use anvil_auth_core::{BackendKind, Config, MessageCatalog, Messaging, Ticks};
use anvil_auth_session::{select_backend, AuthBackend, MemoryAuthProvider, Replay, Script};

use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Replay login and registration dialogs from a script.
#[derive(Parser)]
#[command(name = "anvil-auth-replay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the event script
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Path to config file [default: ~/.config/anvil-auth/config.toml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Milliseconds per tick (the server runs at 50)
    #[arg(long, value_name = "MS", default_value_t = 50)]
    tick_ms: u64,

    /// Stop after this many ticks even if work is pending
    #[arg(long, value_name = "TICKS", default_value_t = 72_000)]
    max_ticks: Ticks,

    /// Increase log verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only show errors
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // JOURNAL_STREAM is set when stdout/stderr go to the journal
    if std::env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(journald_layer)
                .with(filter)
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    setup_logging(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting anvil-auth-replay"
    );

    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration from specified path");
            Config::load_from(path).context("Failed to load configuration")?
        }
        None => {
            let config = Config::load().context("Failed to load configuration")?;
            if let Some(path) = Config::default_path() {
                if path.exists() {
                    info!(path = %path.display(), "Loaded configuration");
                } else {
                    debug!("No config file found, using defaults");
                }
            }
            config
        }
    };

    let script = Script::load_from(&cli.script)
        .with_context(|| format!("Failed to load script {}", cli.script.display()))?;
    info!(
        accounts = script.accounts.len(),
        events = script.events.len(),
        "Loaded script"
    );

    let store = script
        .accounts
        .iter()
        .fold(MemoryAuthProvider::new(), |store, account| {
            store.with_account(&account.name, &account.password)
        });
    let detected = vec![AuthBackend::new(BackendKind::Memory, store)];
    let Some(backend) = select_backend(&config.login_plugin, detected) else {
        let messages = MessageCatalog::with_overrides(&config.messages);
        error!("{}", messages.resolve("authme.not-found", &[]));
        bail!("no usable login backend for {}", config.login_plugin.kind);
    };

    let mut replay = Replay::new(&config, script.events, backend);
    let mut interval = tokio::time::interval(Duration::from_millis(cli.tick_ms.max(1)));

    while !replay.is_finished() {
        if replay.now() >= cli.max_ticks {
            error!(ticks = replay.now(), "Tick limit reached with work pending");
            break;
        }
        interval.tick().await;
        replay.step();
    }

    info!(
        ticks = replay.now(),
        dialogs = replay.gui().controller().active_count(),
        "Replay finished"
    );
    Ok(())
}
