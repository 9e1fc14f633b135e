//! Cellquest Game Host
//!
//! Serves a scripted text adventure over WebSocket. Every player gets a
//! session that survives dropped sockets for a grace window and is resumed
//! by token.

mod adventure;
mod config;
mod context;
mod engine;
mod error;
mod game;
mod outlet;
mod pending;
mod ratelimit;
mod session;
mod store;
mod ws_server;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Args;
use crate::context::ExecutionContext;
use crate::ratelimit::ConnectLimiter;
use crate::session::SessionRegistry;
use crate::store::{FileStore, MemoryStore, SaveStore};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level)?;

    info!("Starting Cellquest Game Host v{}", env!("CARGO_PKG_VERSION"));

    let config = args.server_config();

    let store: Arc<dyn SaveStore> = match &config.save_dir {
        Some(dir) => {
            info!("Saving sessions under {}", dir.display());
            Arc::new(FileStore::new(dir))
        }
        None => {
            info!("Persistence disabled, saves kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let context = if config.parallel_turns {
        info!("Script turns run in parallel");
        ExecutionContext::parallel()
    } else {
        ExecutionContext::new()
    };

    let registry = Arc::new(SessionRegistry::new(
        Arc::new(adventure::Adventure),
        store,
        context,
        ConnectLimiter::new(config.connect_rate),
        config.registry.clone(),
    ));
    let sweeper = registry.clone().spawn_cleanup_task();

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    let app = ws_server::router(registry.clone(), config.idle_timeout);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::serve(listener, app).await {
            error!("Server error: {:#}", e);
        }
    });

    wait_for_shutdown(server_handle).await?;

    sweeper.abort();
    registry.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C, SIGTERM, or the server task ending
async fn wait_for_shutdown(server_handle: tokio::task::JoinHandle<()>) -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to setup SIGTERM handler")?;

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
            result = server_handle => {
                result.context("Server task failed")?;
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
            result = server_handle => {
                result.context("Server task failed")?;
            }
        }
    }

    Ok(())
}

/// Setup logging with tracing
fn setup_logging(level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
