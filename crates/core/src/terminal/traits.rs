//! Display surface abstraction

use super::grid::VirtualTerminal;
use crate::error::{CoreError, Result};

/// Something that can show the virtual terminal to a person
pub trait Surface {
    /// Draw the full grid and place the cursor
    fn present(&mut self, vt: &VirtualTerminal) -> Result<()>;

    /// Show a transient status line (connection state and the like)
    fn status(&mut self, text: &str) -> Result<()>;
}

/// Surface that records what it was asked to show
#[derive(Debug, Default)]
pub struct MockSurface {
    frames: Vec<Vec<String>>,
    statuses: Vec<String>,
    closed: bool,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row texts of every presented frame, oldest first
    pub fn frames(&self) -> &[Vec<String>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&Vec<String>> {
        self.frames.last()
    }

    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    /// Make later calls fail, as a torn-down display would
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Surface for MockSurface {
    fn present(&mut self, vt: &VirtualTerminal) -> Result<()> {
        if self.closed {
            return Err(CoreError::SessionClosed);
        }
        self.frames
            .push((0..vt.rows()).map(|y| vt.row_text(y)).collect());
        Ok(())
    }

    fn status(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(CoreError::SessionClosed);
        }
        self.statuses.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_surface_records_frames() {
        let mut vt = VirtualTerminal::new(2, 4);
        let mut surface = MockSurface::new();
        surface.present(&vt).unwrap();
        vt.print("hey", false);
        surface.present(&vt).unwrap();

        assert_eq!(surface.frames().len(), 2);
        assert_eq!(surface.last_frame().unwrap()[0], "hey ");
    }

    #[test]
    fn test_closed_surface_errors() {
        let vt = VirtualTerminal::default();
        let mut surface = MockSurface::new();
        surface.status("Reconnecting...").unwrap();
        surface.close();
        assert!(surface.present(&vt).is_err());
        assert_eq!(surface.statuses(), ["Reconnecting...".to_string()]);
    }
}
