//! The seam between the substrate and game content

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::GameEngine;
use crate::error::EngineError;

/// A scripted game, run once per session
///
/// The script talks to its player only through `engine`, which it owns
/// exclusively for the session's lifetime. `saved` is the blob loaded for a
/// returning player, if any. Returning ends the session.
#[async_trait]
pub trait Game: Send + Sync {
    async fn run(&self, engine: &mut GameEngine, saved: Option<Value>) -> Result<(), EngineError>;
}
