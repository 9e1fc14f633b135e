//! crossterm rendering of the virtual terminal

use cellquest_core::terminal::Cell;
use cellquest_core::{Color, Surface, VirtualTerminal};
use crossterm::style::{self, Print, SetBackgroundColor, SetForegroundColor};
use crossterm::{cursor, queue, terminal};
use std::io::Write;

/// Map a CGA palette index onto the terminal's 16 colors
pub fn palette(color: Color) -> style::Color {
    use style::Color as C;
    match color.index() {
        0 => C::Black,
        1 => C::DarkBlue,
        2 => C::DarkGreen,
        3 => C::DarkCyan,
        4 => C::DarkRed,
        5 => C::DarkMagenta,
        6 => C::DarkYellow,
        7 => C::Grey,
        8 => C::DarkGrey,
        9 => C::Blue,
        10 => C::Green,
        11 => C::Cyan,
        12 => C::Red,
        13 => C::Magenta,
        14 => C::Yellow,
        _ => C::White,
    }
}

/// Draws the grid at the top-left of `out`, status line just below it
pub struct TermSurface<W: Write> {
    out: W,
}

impl<W: Write> TermSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw_row(&mut self, y: u16, row: &[Cell]) -> std::io::Result<()> {
        queue!(self.out, cursor::MoveTo(0, y))?;

        // one color change per run of equally colored cells
        let mut start = 0;
        while start < row.len() {
            let (fg, bg) = (row[start].fg, row[start].bg);
            let end = row[start..]
                .iter()
                .position(|c| c.fg != fg || c.bg != bg)
                .map_or(row.len(), |n| start + n);
            let text: String = row[start..end].iter().map(|c| c.ch).collect();
            queue!(
                self.out,
                SetForegroundColor(palette(fg)),
                SetBackgroundColor(palette(bg)),
                Print(text)
            )?;
            start = end;
        }
        Ok(())
    }
}

impl<W: Write> Surface for TermSurface<W> {
    fn present(&mut self, vt: &VirtualTerminal) -> cellquest_core::Result<()> {
        queue!(self.out, cursor::Hide)?;
        for y in 0..vt.rows() {
            self.draw_row(y as u16, vt.row(y))?;
        }
        let (x, y) = vt.cursor();
        queue!(self.out, cursor::MoveTo(x as u16, y as u16), cursor::Show)?;
        self.out.flush()?;
        Ok(())
    }

    fn status(&mut self, text: &str) -> cellquest_core::Result<()> {
        queue!(
            self.out,
            cursor::SavePosition,
            cursor::MoveTo(0, cellquest_core::TERM_ROWS as u16),
            style::ResetColor,
            terminal::Clear(terminal::ClearType::CurrentLine),
            Print(text),
            cursor::RestorePosition
        )?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellquest_core::RenderCommand;

    #[test]
    fn test_palette_order() {
        assert_eq!(palette(Color::BLACK), style::Color::Black);
        assert_eq!(palette(Color::BLUE), style::Color::DarkBlue);
        assert_eq!(palette(Color::LIGHT_GRAY), style::Color::Grey);
        assert_eq!(palette(Color::YELLOW), style::Color::Yellow);
        assert_eq!(palette(Color::WHITE), style::Color::White);
        assert_eq!(palette(Color(0x1f)), style::Color::White);
    }

    #[test]
    fn test_present_writes_grid_text() {
        let mut vt = VirtualTerminal::new(3, 10);
        vt.apply(&RenderCommand::print("Hi there"));

        let mut surface = TermSurface::new(Vec::new());
        surface.present(&vt).unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert!(out.contains("Hi there"));
    }

    #[test]
    fn test_status_line() {
        let mut surface = TermSurface::new(Vec::new());
        surface.status("Reconnecting in 2s").unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert!(out.contains("Reconnecting in 2s"));
    }
}
