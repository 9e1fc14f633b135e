//! Keepalive for idle sockets
//!
//! The server closes sockets that stay silent past its idle timeout. A
//! player staring at a prompt sends nothing, so the client emits a
//! `keepalive` on a fixed interval.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};

use crate::types::ClientMessage;
use crate::{CoreError, Result};

/// Default time between keepalives
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub struct Heartbeat;

impl Heartbeat {
    /// Spawn the keepalive task
    ///
    /// Sends `{"type":"keepalive"}` into `tx` every `every`, starting one
    /// period from now. Ends with `SessionClosed` once the receiver is gone.
    pub fn spawn(
        tx: mpsc::UnboundedSender<ClientMessage>,
        every: Duration,
    ) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);

            loop {
                ticker.tick().await;

                if tx.send(ClientMessage::keepalive()).is_err() {
                    tracing::debug!("Keepalive channel closed");
                    return Err(CoreError::SessionClosed);
                }
                tracing::trace!("Keepalive queued");
            }
        })
    }
}
