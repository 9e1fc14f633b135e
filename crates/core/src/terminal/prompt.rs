//! Local interaction that answers a request command
//!
//! A prompt is created when a request is applied to the grid and consumes
//! keys until it resolves to an `InputValue`.

use super::grid::{Cell, VirtualTerminal};
use crate::types::{InputValue, OptionBoxColors};

/// A key press, already decoded from the local keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Up,
    Down,
    Escape,
}

/// Value sent for Enter when answering a key request
pub const ENTER_KEY: &str = "\r";

/// Outstanding request on the client side
#[derive(Debug)]
pub enum Prompt {
    Key(KeyPrompt),
    Line(LinePrompt),
    OptionBox(OptionBoxPrompt),
}

impl Prompt {
    pub fn epoch(&self) -> u64 {
        match self {
            Self::Key(p) => p.epoch,
            Self::Line(p) => p.epoch,
            Self::OptionBox(p) => p.epoch,
        }
    }

    /// Feed one key; returns the answer once the prompt resolves
    pub fn handle_key(&mut self, vt: &mut VirtualTerminal, key: Key) -> Option<InputValue> {
        match self {
            Self::Key(p) => p.handle_key(key),
            Self::Line(p) => p.handle_key(vt, key),
            Self::OptionBox(p) => p.handle_key(vt, key),
        }
    }

    /// Abandon the prompt, undoing any overlay it drew
    pub fn cancel(self, vt: &mut VirtualTerminal) {
        if let Self::OptionBox(p) = self {
            p.restore(vt);
        }
    }
}

/// Single key request
#[derive(Debug)]
pub struct KeyPrompt {
    epoch: u64,
}

impl KeyPrompt {
    pub fn new(epoch: u64) -> Self {
        Self { epoch }
    }

    fn handle_key(&mut self, key: Key) -> Option<InputValue> {
        match key {
            Key::Char(c) => Some(InputValue::Text(c.to_string())),
            Key::Enter => Some(InputValue::Text(ENTER_KEY.to_string())),
            _ => None,
        }
    }
}

/// Line request, echoed in place after the prompt text
#[derive(Debug)]
pub struct LinePrompt {
    epoch: u64,
    buffer: String,
    max_len: usize,
}

impl LinePrompt {
    /// Start collecting at the cursor; input may not leave the row
    pub fn begin(vt: &mut VirtualTerminal, epoch: u64) -> Self {
        vt.settle_wrap();
        let (x, _) = vt.cursor();
        Self {
            epoch,
            buffer: String::new(),
            max_len: vt.cols().saturating_sub(x + 1),
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    fn handle_key(&mut self, vt: &mut VirtualTerminal, key: Key) -> Option<InputValue> {
        match key {
            Key::Char(c) if !c.is_control() => {
                if self.buffer.chars().count() < self.max_len {
                    vt.put_char(c);
                    self.buffer.push(c);
                }
                None
            }
            Key::Backspace => {
                if self.buffer.pop().is_some() {
                    vt.cursor_back();
                    vt.put_char(' ');
                    vt.cursor_back();
                }
                None
            }
            Key::Enter => {
                vt.end_line();
                Some(InputValue::Text(std::mem::take(&mut self.buffer)))
            }
            _ => None,
        }
    }
}

/// Modal menu drawn over the grid
#[derive(Debug)]
pub struct OptionBoxPrompt {
    epoch: u64,
    title: String,
    options: Vec<String>,
    colors: OptionBoxColors,
    selected: usize,
    first_visible: usize,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
    saved: Vec<Cell>,
    saved_cursor: (usize, usize),
}

impl OptionBoxPrompt {
    /// Save the covered cells and draw the box centered on the grid
    pub fn open(
        vt: &mut VirtualTerminal,
        title: &str,
        options: Vec<String>,
        colors: OptionBoxColors,
        default_option: usize,
        epoch: u64,
    ) -> Self {
        let widest = options
            .iter()
            .map(|o| o.chars().count())
            .max()
            .unwrap_or(0)
            .max(title.chars().count() + 2);
        let width = (widest + 4).min(vt.cols());
        let visible = options.len().min(vt.rows().saturating_sub(2)).max(1);
        let height = (visible + 2).min(vt.rows());
        let x0 = (vt.cols() - width) / 2;
        let y0 = (vt.rows() - height) / 2;

        let mut saved = Vec::with_capacity(width * height);
        for y in y0..y0 + height {
            for x in x0..x0 + width {
                if let Some(cell) = vt.cell(x, y) {
                    saved.push(*cell);
                }
            }
        }

        let selected = default_option.min(options.len().saturating_sub(1));
        let mut prompt = Self {
            epoch,
            title: title.to_string(),
            options,
            colors,
            selected,
            first_visible: 0,
            x0,
            y0,
            width,
            height,
            saved,
            saved_cursor: vt.raw_cursor(),
        };
        prompt.scroll_to_selected();
        prompt.draw(vt);
        prompt
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    fn handle_key(&mut self, vt: &mut VirtualTerminal, key: Key) -> Option<InputValue> {
        let n = self.options.len();
        match key {
            Key::Up if n > 0 => {
                self.selected = (self.selected + n - 1) % n;
                self.scroll_to_selected();
                self.draw(vt);
                None
            }
            Key::Down if n > 0 => {
                self.selected = (self.selected + 1) % n;
                self.scroll_to_selected();
                self.draw(vt);
                None
            }
            Key::Enter => {
                self.restore(vt);
                Some(InputValue::Index(self.selected as u64))
            }
            _ => None,
        }
    }

    fn visible_rows(&self) -> usize {
        self.height.saturating_sub(2)
    }

    fn scroll_to_selected(&mut self) {
        let visible = self.visible_rows().max(1);
        if self.selected < self.first_visible {
            self.first_visible = self.selected;
        } else if self.selected >= self.first_visible + visible {
            self.first_visible = self.selected + 1 - visible;
        }
    }

    fn draw(&self, vt: &mut VirtualTerminal) {
        let c = self.colors;
        let inner = self.width.saturating_sub(2);
        let right = self.x0 + self.width.saturating_sub(1);
        let frame = |ch| Cell { ch, fg: c.fg, bg: c.bg };

        // Top border with the title centered in it
        let title: Vec<char> = format!(" {} ", self.title).chars().take(inner).collect();
        let pad = (inner - title.len()) / 2;
        vt.set_cell(self.x0, self.y0, frame('┌'));
        for i in 0..inner {
            let ch = if i >= pad && i - pad < title.len() {
                title[i - pad]
            } else {
                '─'
            };
            vt.set_cell(self.x0 + 1 + i, self.y0, frame(ch));
        }
        vt.set_cell(right, self.y0, frame('┐'));

        for row in 0..self.visible_rows() {
            let y = self.y0 + 1 + row;
            let index = self.first_visible + row;
            let (fg, bg) = if index == self.selected {
                (c.highlight_fg, c.highlight_bg)
            } else {
                (c.fg, c.bg)
            };
            let label: Vec<char> = self
                .options
                .get(index)
                .map(|o| o.chars().collect())
                .unwrap_or_default();

            vt.set_cell(self.x0, y, frame('│'));
            for i in 0..inner {
                // one column of padding on each side
                let ch = if i >= 1 && i - 1 < label.len() && i + 1 < inner {
                    label[i - 1]
                } else {
                    ' '
                };
                vt.set_cell(self.x0 + 1 + i, y, Cell { ch, fg, bg });
            }
            vt.set_cell(right, y, frame('│'));
        }

        let bottom = self.y0 + self.height.saturating_sub(1);
        vt.set_cell(self.x0, bottom, frame('└'));
        for i in 0..inner {
            vt.set_cell(self.x0 + 1 + i, bottom, frame('─'));
        }
        vt.set_cell(right, bottom, frame('┘'));
    }

    fn restore(&self, vt: &mut VirtualTerminal) {
        let mut cells = self.saved.iter();
        for y in self.y0..self.y0 + self.height {
            for x in self.x0..self.x0 + self.width {
                if let Some(cell) = cells.next() {
                    vt.set_cell(x, y, *cell);
                }
            }
        }
        vt.set_cursor(self.saved_cursor.0, self.saved_cursor.1);
    }
}
