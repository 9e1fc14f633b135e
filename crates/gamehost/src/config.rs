//! Command-line configuration

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{EngineConfig, DEFAULT_MAX_BATCH};
use crate::session::RegistryConfig;

/// Cellquest game host - serves the adventure over WebSocket
#[derive(Parser, Debug)]
#[command(name = "gamehost")]
#[command(author = "Cellquest Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Session host for the Cellquest text adventure", long_about = None)]
pub struct Args {
    /// Bind address for the WebSocket server
    #[arg(short, long, env = "CELLQUEST_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CELLQUEST_LOG", default_value = "info")]
    pub log_level: String,

    /// Seconds a disconnected session is kept for reconnect
    #[arg(long, default_value_t = 86_400)]
    pub grace_secs: u64,

    /// Seconds between sweeps for expired sessions
    #[arg(long, default_value_t = 30)]
    pub sweep_secs: u64,

    /// Seconds a silent socket is kept open
    #[arg(long, default_value_t = 120)]
    pub idle_timeout_secs: u64,

    /// Directory for save files
    #[arg(long, env = "CELLQUEST_SAVE_DIR")]
    pub save_dir: Option<PathBuf>,

    /// Keep saves in memory only
    #[arg(long, default_value = "false")]
    pub no_persist: bool,

    /// Commands per batch before an early flush
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH)]
    pub max_batch: usize,

    /// New sessions per minute per IP (0 disables the limit)
    #[arg(long, default_value_t = 20)]
    pub connect_rate: u32,

    /// Let sessions run script code concurrently
    #[arg(long, default_value = "false")]
    pub parallel_turns: bool,
}

/// Settled server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub registry: RegistryConfig,
    pub idle_timeout: Duration,
    /// `None` keeps saves in memory
    pub save_dir: Option<PathBuf>,
    pub connect_rate: u32,
    pub parallel_turns: bool,
}

impl Args {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            registry: RegistryConfig {
                grace: Duration::from_secs(self.grace_secs),
                sweep_interval: Duration::from_secs(self.sweep_secs.max(1)),
                engine: EngineConfig {
                    max_batch_commands: self.max_batch.max(1),
                },
            },
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.max(1)),
            save_dir: if self.no_persist {
                None
            } else {
                Some(self.save_dir.clone().unwrap_or_else(crate::store::FileStore::default_dir))
            },
            connect_rate: self.connect_rate,
            parallel_turns: self.parallel_turns,
        }
    }
}
