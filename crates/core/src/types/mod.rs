//! Wire types shared by the game host and the terminal client

mod command;
mod message;

pub use command::{Color, OptionBoxColors, RenderCommand};
pub use message::{ClientMessage, ControlMessage, InputValue, Response, ServerControl, ServerMessage};
