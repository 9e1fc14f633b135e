//! Cellquest terminal client
//!
//! Renders the game's virtual terminal with crossterm and keeps the session
//! alive across dropped connections.

mod client;
mod keys;
mod raw_mode;
mod surface;
mod token_file;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::EventStream;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::client::{Client, ClientConfig, Exit};
use crate::surface::TermSurface;

/// Cellquest terminal client
#[derive(Parser, Debug)]
#[command(name = "term_client")]
#[command(author = "Cellquest Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Play Cellquest in your terminal", long_about = None)]
struct Args {
    /// Game host WebSocket URL
    #[arg(short, long, env = "CELLQUEST_URL", default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// File holding the session token between runs
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Start a new game instead of resuming
    #[arg(long, default_value = "false")]
    new: bool,

    /// Write logs here (the terminal itself is the game screen)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.log_file.as_deref(), &args.log_level)?;
    info!("Starting Cellquest client v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ClientConfig::new(
        args.url,
        args.token_file.unwrap_or_else(token_file::default_path),
    );
    config.fresh = args.new;

    let guard = raw_mode::RawModeGuard::enable().context("Terminal does not support raw mode")?;
    let mut keys = EventStream::new();
    let mut client = Client::new(config, TermSurface::new(std::io::stdout()));
    let result = client.run(&mut keys).await;
    drop(guard);

    match result? {
        Exit::Quit => println!("Goodbye. Run again to resume your game."),
        Exit::SessionEnded => println!("The game has ended."),
    }
    Ok(())
}

/// Setup logging with tracing; nothing is logged without a log file
fn setup_logging(path: Option<&Path>, level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let file_layer = match path {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
