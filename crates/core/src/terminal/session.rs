//! Client-side state of one game session
//!
//! Applies server batches to the grid, routes keystrokes to the active
//! prompt, and turns resolved prompts into responses tagged with their epoch.

use super::grid::VirtualTerminal;
use super::prompt::{Key, Prompt};
use crate::streaming::KeyBuffer;
use crate::types::{ClientMessage, RenderCommand, ServerControl, ServerMessage};

#[derive(Debug, Default)]
pub struct TerminalSession {
    vt: VirtualTerminal,
    prompt: Option<Prompt>,
    keys: KeyBuffer,
    token: Option<String>,
    last_batch: Option<Vec<RenderCommand>>,
    /// Answer given to the last batch's request
    last_response: Option<ClientMessage>,
    /// Set when the server confirmed our token; the next batch may be a replay
    resumed: bool,
}

impl TerminalSession {
    pub fn new(vt: VirtualTerminal) -> Self {
        Self {
            vt,
            ..Default::default()
        }
    }

    /// Start from a token saved by an earlier run
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn terminal(&self) -> &VirtualTerminal {
        &self.vt
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Epoch of the prompt waiting for keys, if any
    pub fn prompt_epoch(&self) -> Option<u64> {
        self.prompt.as_ref().map(Prompt::epoch)
    }

    /// Message opening (or resuming) the session on a fresh socket
    pub fn connect_message(&self) -> ClientMessage {
        ClientMessage::connect(self.token.clone())
    }

    /// Handle one server message, returning responses to send
    pub fn handle_server(&mut self, msg: ServerMessage) -> Vec<ClientMessage> {
        match msg {
            ServerMessage::Control(ServerControl::Token { token }) => {
                self.resumed = self.token.as_deref() == Some(token.as_str());
                if !self.resumed {
                    tracing::info!("Server started a new session");
                    if let Some(prompt) = self.prompt.take() {
                        prompt.cancel(&mut self.vt);
                    }
                    self.keys.clear();
                    self.last_batch = None;
                    self.last_response = None;
                }
                self.token = Some(token);
                Vec::new()
            }
            ServerMessage::Batch(batch) => self.apply_batch(batch),
        }
    }

    /// Apply a batch in order
    ///
    /// Any new batch means the server is no longer waiting on the current
    /// prompt, so it is cancelled. A batch identical to the last one, arriving
    /// right after a resume, is the server's replay and is skipped since the
    /// grid already shows it. If we had already answered it, the answer may
    /// have been lost with the old socket, so it is sent again; the server
    /// discards it if it did arrive.
    pub fn apply_batch(&mut self, batch: Vec<RenderCommand>) -> Vec<ClientMessage> {
        let replay = std::mem::take(&mut self.resumed)
            && self.last_batch.as_ref() == Some(&batch);
        if replay {
            tracing::debug!("Skipping replayed batch");
            return match (&self.prompt, &self.last_response) {
                (None, Some(answer)) => vec![answer.clone()],
                _ => Vec::new(),
            };
        }
        self.last_response = None;

        if let Some(prompt) = self.prompt.take() {
            tracing::debug!(epoch = prompt.epoch(), "Prompt superseded by new batch");
            prompt.cancel(&mut self.vt);
        }

        for cmd in &batch {
            if let Some(prompt) = self.vt.apply(cmd) {
                if let Some(old) = self.prompt.replace(prompt) {
                    old.cancel(&mut self.vt);
                }
            }
        }
        // A re-sent request is never cached for replay on the server side
        if self.is_resend(&batch) {
            tracing::debug!("Request re-sent after a rejected key");
        } else {
            self.last_batch = Some(batch);
        }

        let mut responses = Vec::new();
        while self.prompt.is_some() {
            let Some(key) = self.keys.pop() else { break };
            if let Some(response) = self.feed(key) {
                responses.push(response);
            }
        }
        responses
    }

    /// Handle a local key press
    ///
    /// Keys typed while nothing is waiting are buffered for the next prompt.
    pub fn handle_key(&mut self, key: Key) -> Option<ClientMessage> {
        if self.prompt.is_none() {
            if self.keys.push(key) {
                tracing::trace!("Key buffer full, dropped oldest key");
            }
            return None;
        }
        self.feed(key)
    }

    /// A lone request repeating the epoch of the last batch's request
    fn is_resend(&self, batch: &[RenderCommand]) -> bool {
        let [only] = batch else { return false };
        let Some(epoch) = only.epoch() else { return false };
        let cached = self
            .last_batch
            .as_ref()
            .and_then(|last| last.iter().rev().find_map(RenderCommand::epoch));
        cached == Some(epoch)
    }

    fn feed(&mut self, key: Key) -> Option<ClientMessage> {
        let prompt = self.prompt.as_mut()?;
        let value = prompt.handle_key(&mut self.vt, key)?;
        let epoch = prompt.epoch();
        self.prompt = None;
        let response = ClientMessage::response(value, Some(epoch));
        self.last_response = Some(response.clone());
        Some(response)
    }
}
