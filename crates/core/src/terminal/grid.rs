//! Fixed-size character cell grid with a cursor

use super::prompt::{KeyPrompt, LinePrompt, OptionBoxPrompt, Prompt};
use crate::types::{Color, RenderCommand};
use crate::{TERM_COLS, TERM_ROWS};

/// One character cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Cell {
    pub fn blank(fg: Color, bg: Color) -> Self {
        Self { ch: ' ', fg, bg }
    }
}

/// The display a game session draws on
///
/// Mutated only by applying render commands in order, plus the echo and
/// overlay drawing done by active prompts.
#[derive(Debug, Clone)]
pub struct VirtualTerminal {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
    /// May equal `cols` after writing the last column (wrap pending)
    cursor_x: usize,
    cursor_y: usize,
    fg: Color,
    bg: Color,
}

impl VirtualTerminal {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_colors(rows, cols, Color::LIGHT_GRAY, Color::BLACK)
    }

    pub fn with_colors(rows: usize, cols: usize, fg: Color, bg: Color) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            rows,
            cols,
            cells: vec![vec![Cell::blank(fg, bg); cols]; rows],
            cursor_x: 0,
            cursor_y: 0,
            fg,
            bg,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cursor position as (x, y), clamped into the grid
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x.min(self.cols - 1), self.cursor_y)
    }

    /// Current (fg, bg)
    pub fn color(&self) -> (Color, Color) {
        (self.fg, self.bg)
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.cells.get(y).and_then(|row| row.get(x))
    }

    pub fn row(&self, y: usize) -> &[Cell] {
        &self.cells[y.min(self.rows - 1)]
    }

    /// Characters of one row, trailing spaces included
    pub fn row_text(&self, y: usize) -> String {
        self.row(y).iter().map(|c| c.ch).collect()
    }

    /// Apply one render command
    ///
    /// Request commands draw whatever they need and return the prompt that
    /// will collect the answer.
    pub fn apply(&mut self, cmd: &RenderCommand) -> Option<Prompt> {
        match cmd {
            RenderCommand::Print { text, extend } => {
                self.print(text, *extend);
                None
            }
            RenderCommand::Clear => {
                self.clear();
                None
            }
            RenderCommand::Locate { x, y } => {
                self.locate(*x as usize, *y as usize);
                None
            }
            RenderCommand::Color { fg, bg } => {
                self.fg = *fg;
                self.bg = *bg;
                None
            }
            RenderCommand::GetKey { epoch, .. } => Some(Prompt::Key(KeyPrompt::new(*epoch))),
            RenderCommand::Input { prompt, epoch } => {
                self.print(prompt, true);
                Some(Prompt::Line(LinePrompt::begin(self, *epoch)))
            }
            RenderCommand::OptionBox {
                title,
                options,
                colors,
                default_option,
                epoch,
            } => Some(Prompt::OptionBox(OptionBoxPrompt::open(
                self,
                title,
                options.clone(),
                *colors,
                *default_option,
                *epoch,
            ))),
        }
    }

    /// Write text at the cursor
    ///
    /// Each `\n` ends the current row as a non-extend print would. Without
    /// `extend` the final row is ended too.
    pub fn print(&mut self, text: &str, extend: bool) {
        let mut segments = text.split('\n').peekable();
        while let Some(segment) = segments.next() {
            for ch in segment.chars() {
                match ch {
                    '\r' => {}
                    c if c.is_control() => self.put_char(' '),
                    c => self.put_char(c),
                }
            }
            if segments.peek().is_some() || !extend {
                self.end_line();
            }
        }
    }

    /// Write one character at the cursor and advance, wrapping if needed
    pub fn put_char(&mut self, ch: char) {
        self.settle_wrap();
        self.cells[self.cursor_y][self.cursor_x] = Cell {
            ch,
            fg: self.fg,
            bg: self.bg,
        };
        self.cursor_x += 1;
    }

    /// Pad the rest of the row with the current background and move to the
    /// start of the next row
    pub fn end_line(&mut self) {
        for x in self.cursor_x..self.cols {
            self.cells[self.cursor_y][x] = Cell::blank(self.fg, self.bg);
        }
        self.linefeed();
    }

    /// Perform a pending wrap so the cursor addresses a real cell
    pub fn settle_wrap(&mut self) {
        if self.cursor_x >= self.cols {
            self.linefeed();
        }
    }

    pub fn clear(&mut self) {
        let blank = Cell::blank(self.fg, self.bg);
        for row in &mut self.cells {
            row.fill(blank);
        }
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    /// Move the cursor, clamped into the grid
    pub fn locate(&mut self, x: usize, y: usize) {
        self.cursor_x = x.min(self.cols - 1);
        self.cursor_y = y.min(self.rows - 1);
    }

    /// Overwrite a cell without touching the cursor; out of range is ignored
    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    }

    /// Cursor position including a pending wrap
    pub(crate) fn raw_cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    /// Move the cursor back one column within the row
    pub(crate) fn cursor_back(&mut self) {
        self.cursor_x = self.cursor_x.saturating_sub(1);
    }

    pub(crate) fn set_cursor(&mut self, x: usize, y: usize) {
        self.cursor_x = x.min(self.cols);
        self.cursor_y = y.min(self.rows - 1);
    }

    fn linefeed(&mut self) {
        self.cursor_x = 0;
        if self.cursor_y + 1 >= self.rows {
            self.scroll_up();
        } else {
            self.cursor_y += 1;
        }
    }

    fn scroll_up(&mut self) {
        self.cells.remove(0);
        self.cells.push(vec![Cell::blank(self.fg, self.bg); self.cols]);
    }
}

impl Default for VirtualTerminal {
    fn default() -> Self {
        Self::new(TERM_ROWS, TERM_COLS)
    }
}
