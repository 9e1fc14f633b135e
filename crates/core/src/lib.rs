//! Cellquest Core - Shared protocol and terminal logic
//!
//! This crate provides:
//! - Wire types (render commands, client/server messages)
//! - Protocol handling (JSON text frames)
//! - The virtual terminal grid and its input prompts
//! - Display surface trait
//! - Session tokens
//! - Error types

/// Rows of the virtual terminal.
pub const TERM_ROWS: usize = 25;
/// Columns of the virtual terminal.
pub const TERM_COLS: usize = 80;

pub mod auth;
pub mod error;
pub mod protocol;
pub mod streaming;
pub mod terminal;
pub mod transport;
pub mod types;

// Re-export common types
pub use auth::SessionToken;
pub use error::{CoreError, Result};
pub use protocol::MessageCodec;
pub use streaming::KeyBuffer;
pub use terminal::{Key, MockSurface, Prompt, Surface, TerminalSession, VirtualTerminal};
pub use types::{ClientMessage, Color, InputValue, OptionBoxColors, RenderCommand, ServerMessage};
