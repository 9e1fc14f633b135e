//! Virtual terminal: the cell grid, its prompts, and the client session

mod grid;
mod prompt;
mod session;
mod traits;

pub use grid::{Cell, VirtualTerminal};
pub use prompt::{Key, KeyPrompt, LinePrompt, OptionBoxPrompt, Prompt, ENTER_KEY};
pub use session::TerminalSession;
pub use traits::{MockSurface, Surface};
