//! Execution context: the process-wide turn gate
//!
//! At most one session runs script code at a time. Sessions queue on a fair
//! mutex and are admitted in arrival order. Entering returns a `TurnGuard`;
//! dropping it exits, on every path including errors and panics.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct Inner {
    gate: Arc<AsyncMutex<()>>,
    owner: Mutex<Option<u64>>,
}

/// Shared turn gate; clones refer to the same gate
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Option<Arc<Inner>>,
}

impl ExecutionContext {
    /// Serialized turns, FIFO
    pub fn new() -> Self {
        Self {
            inner: Some(Arc::new(Inner {
                gate: Arc::new(AsyncMutex::new(())),
                owner: Mutex::new(None),
            })),
        }
    }

    /// Pass-through gate: every enter succeeds at once
    pub fn parallel() -> Self {
        Self { inner: None }
    }

    /// Wait for the gate, then bind it to `id`
    pub async fn enter(&self, id: u64) -> TurnGuard {
        let Some(inner) = &self.inner else {
            return TurnGuard {
                _permit: None,
                inner: None,
                id,
            };
        };

        let permit = inner.gate.clone().lock_owned().await;
        *inner.owner.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        tracing::trace!(session = id, "Turn entered");

        TurnGuard {
            _permit: Some(permit),
            inner: Some(inner.clone()),
            id,
        }
    }

    /// Session currently bound, if any
    pub fn owner(&self) -> Option<u64> {
        self.inner
            .as_ref()
            .and_then(|inner| *inner.owner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of holding the turn; drop to exit
pub struct TurnGuard {
    _permit: Option<OwnedMutexGuard<()>>,
    inner: Option<Arc<Inner>>,
    id: u64,
}

impl TurnGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if let Some(inner) = &self.inner {
            let mut owner = inner.owner.lock().unwrap_or_else(PoisonError::into_inner);
            if *owner == Some(self.id) {
                *owner = None;
            }
            tracing::trace!(session = self.id, "Turn exited");
        }
        // permit is released after this, unblocking the next waiter
    }
}
