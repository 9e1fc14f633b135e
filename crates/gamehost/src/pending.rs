//! The single outstanding input request of an engine

use cellquest_core::types::{InputValue, OptionBoxColors, RenderCommand, Response};

/// What kind of answer a request expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// One key, optionally restricted to a set
    Key { options: Option<Vec<char>> },
    /// A line of text
    Line { prompt: String },
    /// An index into a menu
    Choice {
        title: String,
        options: Vec<String>,
        colors: OptionBoxColors,
        default_option: usize,
    },
}

/// Outcome of matching a response against the pending request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Answer accepted; the request is done
    Accepted(InputValue),
    /// Addressed to an older request
    Stale { epoch: u64 },
    /// Well-formed key outside the allowed set; re-send and keep waiting
    Rejected,
    /// Wrong shape for this request
    Malformed,
}

#[derive(Debug, Clone)]
pub struct PendingInput {
    epoch: u64,
    kind: RequestKind,
}

impl PendingInput {
    pub fn new(epoch: u64, kind: RequestKind) -> Self {
        Self { epoch, kind }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Render command that asks the client for this input
    pub fn command(&self) -> RenderCommand {
        let epoch = self.epoch;
        match &self.kind {
            RequestKind::Key { options } => RenderCommand::GetKey {
                options: options.clone(),
                epoch,
            },
            RequestKind::Line { prompt } => RenderCommand::Input {
                prompt: prompt.clone(),
                epoch,
            },
            RequestKind::Choice {
                title,
                options,
                colors,
                default_option,
            } => RenderCommand::OptionBox {
                title: title.clone(),
                options: options.clone(),
                colors: *colors,
                default_option: *default_option,
                epoch,
            },
        }
    }

    /// Match a response against this request
    ///
    /// A response without an epoch addresses the current request.
    pub fn resolve(&self, response: &Response) -> Resolution {
        if let Some(epoch) = response.epoch {
            if epoch != self.epoch {
                return Resolution::Stale { epoch };
            }
        }

        match &self.kind {
            RequestKind::Key { options } => match response.input.as_key() {
                Some(key) if options.as_ref().map_or(true, |o| o.contains(&key)) => {
                    Resolution::Accepted(response.input.clone())
                }
                Some(_) => Resolution::Rejected,
                None => Resolution::Malformed,
            },
            RequestKind::Line { .. } => match &response.input {
                InputValue::Text(_) => Resolution::Accepted(response.input.clone()),
                InputValue::Index(_) => Resolution::Malformed,
            },
            RequestKind::Choice { options, .. } => match response.input.as_index() {
                Some(i) if (i as usize) < options.len() => {
                    Resolution::Accepted(response.input.clone())
                }
                _ => Resolution::Malformed,
            },
        }
    }
}
