//! Output side of a session, shared by its engine and the registry
//!
//! Holds the attached socket (if any), the cached last batch for replay on
//! reconnect, and what should be persisted when the session is torn down.

use cellquest_core::types::{RenderCommand, ServerMessage};
use cellquest_core::SessionToken;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Frame queued for a socket's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Close the socket after everything queued before it; the session is over
    Close,
    /// Turn the connection away without a session
    Refuse,
}

pub type SocketTx = mpsc::UnboundedSender<Outbound>;

pub type SharedOutlet = Arc<Mutex<Outlet>>;

/// Lock an outlet, recovering from a poisoned lock
pub fn lock(outlet: &SharedOutlet) -> MutexGuard<'_, Outlet> {
    outlet.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct Outlet {
    socket: Option<SocketTx>,
    last_batch: Option<Vec<RenderCommand>>,
    /// False while `last_batch` holds output no socket has seen
    delivered: bool,
    alive: bool,
    checkpoint: Option<Value>,
}

impl Outlet {
    pub fn new(socket: Option<SocketTx>) -> Self {
        Self {
            socket,
            last_batch: None,
            delivered: true,
            alive: true,
            checkpoint: None,
        }
    }

    pub fn shared(socket: Option<SocketTx>) -> SharedOutlet {
        Arc::new(Mutex::new(Self::new(socket)))
    }

    /// Attach a socket: send the token, then replay the last batch once
    pub fn attach(&mut self, socket: SocketTx, token: &SessionToken) {
        self.socket = Some(socket);
        self.send(ServerMessage::token(token.to_hex()));
        if let Some(batch) = self.last_batch.clone() {
            tracing::debug!(commands = batch.len(), "Replaying last batch");
            self.delivered = self.send(ServerMessage::Batch(batch));
        }
    }

    pub fn detach(&mut self) {
        self.socket = None;
    }

    pub fn is_attached(&self) -> bool {
        self.socket.is_some()
    }

    /// Ask the attached socket to close, then forget it
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = socket.send(Outbound::Close);
        }
    }

    /// Cache a flushed batch and deliver it if a socket is attached
    ///
    /// Output flushed while detached is kept and merged into the next batch,
    /// so a reconnect replays everything the client missed.
    pub fn publish(&mut self, batch: Vec<RenderCommand>) {
        let batch = match (self.delivered, self.last_batch.take()) {
            (false, Some(mut held)) => {
                held.extend(batch);
                held
            }
            _ => batch,
        };
        self.last_batch = Some(batch.clone());
        self.delivered = self.send(ServerMessage::Batch(batch));
    }

    /// Deliver without touching the replay cache
    pub fn send_uncached(&mut self, batch: Vec<RenderCommand>) {
        self.send(ServerMessage::Batch(batch));
    }

    pub fn last_batch(&self) -> Option<&[RenderCommand]> {
        self.last_batch.as_deref()
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn set_checkpoint(&mut self, blob: Value) {
        self.checkpoint = Some(blob);
    }

    /// Blob to persist at teardown: only for a living player with a checkpoint
    pub fn persistable(&self) -> Option<Value> {
        if self.alive {
            self.checkpoint.clone()
        } else {
            None
        }
    }

    fn send(&mut self, msg: ServerMessage) -> bool {
        let Some(socket) = &self.socket else {
            return false;
        };
        if socket.send(Outbound::Message(msg)).is_err() {
            tracing::debug!("Socket writer gone, detaching");
            self.socket = None;
            return false;
        }
        true
    }
}
