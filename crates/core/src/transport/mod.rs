//! Client transport helpers
//!
//! Socket-agnostic pieces of staying connected:
//! - Periodic keepalive so the server's idle timeout never fires on a
//!   quiet player
//! - Reconnection with exponential backoff

pub mod heartbeat;
pub mod reconnect;

pub use heartbeat::{Heartbeat, KEEPALIVE_INTERVAL};
pub use reconnect::{Backoff, ReconnectConfig};
