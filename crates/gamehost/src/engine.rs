//! Game engine: one session's I/O surface for scripts
//!
//! Scripts call `print`/`color`/`locate`/`clear` to queue render commands,
//! and `get_key`/`query`/`option_box`/`pause` to flush the queue and wait.
//! The engine holds the execution context turn while the script runs and
//! gives it up at every suspension point.

use cellquest_core::types::{Color, InputValue, OptionBoxColors, RenderCommand, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::context::{ExecutionContext, TurnGuard};
use crate::error::EngineError;
use crate::outlet::{self, SharedOutlet};
use crate::pending::{PendingInput, RequestKind, Resolution};
use crate::store::SaveStore;

/// Default cap on queued commands before an early flush
pub const DEFAULT_MAX_BATCH: usize = 4096;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_batch_commands: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_commands: DEFAULT_MAX_BATCH,
        }
    }
}

/// Everything an engine is wired to
pub struct EngineLinks {
    pub outlet: SharedOutlet,
    pub responses: mpsc::UnboundedReceiver<Response>,
    pub context: ExecutionContext,
    pub store: Arc<dyn SaveStore>,
}

pub struct GameEngine {
    id: u64,
    key: String,
    links: EngineLinks,
    turn: Option<TurnGuard>,
    pending: Vec<RenderCommand>,
    epoch: u64,
    config: EngineConfig,
}

impl GameEngine {
    pub fn new(id: u64, key: String, links: EngineLinks, config: EngineConfig) -> Self {
        Self {
            id,
            key,
            links,
            turn: None,
            pending: Vec::new(),
            epoch: 0,
            config,
        }
    }

    /// Key the session's saves are stored under
    pub fn session_key(&self) -> &str {
        &self.key
    }

    /// Epoch of the most recent request
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn print(&mut self, text: impl Into<String>) {
        self.push(RenderCommand::print(text));
    }

    /// Print without ending the line
    pub fn print_extend(&mut self, text: impl Into<String>) {
        self.push(RenderCommand::print_extend(text));
    }

    pub fn clear(&mut self) {
        self.push(RenderCommand::Clear);
    }

    pub fn color(&mut self, fg: Color, bg: Color) {
        self.push(RenderCommand::Color { fg, bg });
    }

    pub fn locate(&mut self, x: u16, y: u16) {
        self.push(RenderCommand::Locate { x, y });
    }

    /// Wait for one key; with `options`, only those keys are accepted
    pub async fn get_key(&mut self, options: Option<&[char]>) -> Result<char, EngineError> {
        let kind = RequestKind::Key {
            options: options.map(<[char]>::to_vec),
        };
        let value = self.request(kind).await?;
        value
            .as_key()
            .ok_or_else(|| EngineError::InvalidRequest(format!("not a key: {:?}", value)))
    }

    /// Ask for a line of text
    pub async fn query(&mut self, prompt: impl Into<String>) -> Result<String, EngineError> {
        let kind = RequestKind::Line {
            prompt: prompt.into(),
        };
        match self.request(kind).await? {
            InputValue::Text(text) => Ok(text),
            other => Err(EngineError::InvalidRequest(format!("not text: {:?}", other))),
        }
    }

    /// Show a menu and wait for a choice
    pub async fn option_box<S: AsRef<str>>(
        &mut self,
        title: &str,
        options: &[S],
        colors: OptionBoxColors,
        default_option: usize,
    ) -> Result<usize, EngineError> {
        if options.is_empty() {
            return Err(EngineError::InvalidRequest("option box without options".into()));
        }
        let kind = RequestKind::Choice {
            title: title.to_string(),
            options: options.iter().map(|o| o.as_ref().to_string()).collect(),
            colors,
            default_option: default_option.min(options.len() - 1),
        };
        let value = self.request(kind).await?;
        value
            .as_index()
            .map(|i| i as usize)
            .ok_or_else(|| EngineError::InvalidRequest(format!("not an index: {:?}", value)))
    }

    /// Flush, then sleep without waiting on the client
    pub async fn pause(&mut self, duration: Duration) {
        self.flush();
        self.turn = None;
        tokio::time::sleep(duration).await;
        self.begin_turn().await;
    }

    /// Record what to persist if the session is torn down
    pub fn checkpoint(&mut self, blob: Value) {
        outlet::lock(&self.links.outlet).set_checkpoint(blob);
    }

    /// Dead players are not persisted at teardown
    pub fn set_player_alive(&mut self, alive: bool) {
        outlet::lock(&self.links.outlet).set_alive(alive);
    }

    /// Explicit save point: checkpoint and write through to the store
    ///
    /// The turn is given up while the store works, so a slow store only
    /// holds up this session. Store failures are logged; the checkpoint
    /// still stands.
    pub async fn save(&mut self, blob: Value) {
        self.checkpoint(blob.clone());

        let had_turn = self.turn.take().is_some();
        if let Err(e) = self.links.store.save(&self.key, &blob).await {
            tracing::warn!(session = self.id, "Save failed: {}", e);
        }
        if had_turn {
            self.begin_turn().await;
        }
    }

    /// Take the turn before running script code
    pub(crate) async fn begin_turn(&mut self) {
        self.turn = Some(self.links.context.enter(self.id).await);
    }

    /// Flush leftover output and give up the turn once the script is done
    pub(crate) fn finish(&mut self) {
        self.flush();
        self.turn = None;
    }

    fn push(&mut self, cmd: RenderCommand) {
        self.pending.push(cmd);
        if self.pending.len() >= self.config.max_batch_commands {
            tracing::warn!(
                session = self.id,
                "Batch reached {} commands, flushing early",
                self.pending.len()
            );
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        tracing::trace!(session = self.id, commands = batch.len(), "Flushing batch");
        outlet::lock(&self.links.outlet).publish(batch);
    }

    async fn request(&mut self, kind: RequestKind) -> Result<InputValue, EngineError> {
        self.epoch += 1;
        let pending = PendingInput::new(self.epoch, kind);

        // Answers queued before this request went out cannot be for it
        while let Ok(early) = self.links.responses.try_recv() {
            tracing::debug!(session = self.id, ?early, "Discarding response to an earlier request");
        }

        self.pending.push(pending.command());
        self.flush();

        self.turn = None;
        let answer = self.await_answer(&pending).await;
        self.begin_turn().await;
        answer
    }

    async fn await_answer(&mut self, pending: &PendingInput) -> Result<InputValue, EngineError> {
        loop {
            let response = self
                .links
                .responses
                .recv()
                .await
                .ok_or(EngineError::SessionClosed)?;

            match pending.resolve(&response) {
                Resolution::Accepted(value) => return Ok(value),
                Resolution::Stale { epoch } => {
                    tracing::debug!(
                        session = self.id,
                        "Discarding stale response for epoch {} (current {})",
                        epoch,
                        pending.epoch()
                    );
                }
                Resolution::Rejected => {
                    tracing::debug!(session = self.id, "Key not among options, asking again");
                    outlet::lock(&self.links.outlet).send_uncached(vec![pending.command()]);
                }
                Resolution::Malformed => {
                    tracing::warn!(
                        session = self.id,
                        "Response does not fit request: {:?}",
                        response.input
                    );
                }
            }
        }
    }
}
