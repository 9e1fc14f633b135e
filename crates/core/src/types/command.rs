//! Render commands flushed from a game session to the terminal client

use serde::{Deserialize, Serialize};

/// Palette color index (0-15, CGA order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u8);

impl Color {
    pub const BLACK: Color = Color(0);
    pub const BLUE: Color = Color(1);
    pub const GREEN: Color = Color(2);
    pub const CYAN: Color = Color(3);
    pub const RED: Color = Color(4);
    pub const MAGENTA: Color = Color(5);
    pub const BROWN: Color = Color(6);
    pub const LIGHT_GRAY: Color = Color(7);
    pub const DARK_GRAY: Color = Color(8);
    pub const LIGHT_BLUE: Color = Color(9);
    pub const LIGHT_GREEN: Color = Color(10);
    pub const LIGHT_CYAN: Color = Color(11);
    pub const LIGHT_RED: Color = Color(12);
    pub const LIGHT_MAGENTA: Color = Color(13);
    pub const YELLOW: Color = Color(14);
    pub const WHITE: Color = Color(15);

    /// Palette index, masked into range
    pub fn index(self) -> u8 {
        self.0 & 0x0f
    }
}

/// Colors of a modal option box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionBoxColors {
    pub fg: Color,
    pub bg: Color,
    pub highlight_fg: Color,
    pub highlight_bg: Color,
}

impl Default for OptionBoxColors {
    fn default() -> Self {
        Self {
            fg: Color::WHITE,
            bg: Color::BLUE,
            highlight_fg: Color::BLUE,
            highlight_bg: Color::WHITE,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One unit of terminal mutation, or a request for input
///
/// Request variants (`GetKey`, `Input`, `OptionBox`) carry the epoch they
/// were issued under; the client echoes it back with its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum RenderCommand {
    Print {
        text: String,
        #[serde(default, skip_serializing_if = "is_false")]
        extend: bool,
    },

    Clear,

    Locate { x: u16, y: u16 },

    Color { fg: Color, bg: Color },

    GetKey {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Vec<char>>,
        #[serde(default)]
        epoch: u64,
    },

    Input {
        prompt: String,
        #[serde(default)]
        epoch: u64,
    },

    #[serde(rename_all = "camelCase")]
    OptionBox {
        title: String,
        options: Vec<String>,
        #[serde(default)]
        colors: OptionBoxColors,
        #[serde(default)]
        default_option: usize,
        #[serde(default)]
        epoch: u64,
    },
}

impl RenderCommand {
    /// Print a full line
    pub fn print(text: impl Into<String>) -> Self {
        Self::Print {
            text: text.into(),
            extend: false,
        }
    }

    /// Print without ending the line
    pub fn print_extend(text: impl Into<String>) -> Self {
        Self::Print {
            text: text.into(),
            extend: true,
        }
    }

    /// True for commands that ask the client for input
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Self::GetKey { .. } | Self::Input { .. } | Self::OptionBox { .. }
        )
    }

    /// Epoch of a request command
    pub fn epoch(&self) -> Option<u64> {
        match self {
            Self::GetKey { epoch, .. } | Self::Input { epoch, .. } | Self::OptionBox { epoch, .. } => {
                Some(*epoch)
            }
            _ => None,
        }
    }
}
