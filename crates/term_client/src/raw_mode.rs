//! Raw mode terminal wrapper for crossterm
//!
//! Ensures the terminal is restored on drop (even on panic).

use anyhow::Result;
use crossterm::{cursor, execute, terminal};
use std::io::stdout;

/// Guard that enters raw mode on the alternate screen and restores the
/// normal screen on drop.
///
/// # Example
/// ```no_run
/// let _guard = RawModeGuard::enable()?;
/// // Terminal is now in raw mode on the alternate screen
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct RawModeGuard;

impl RawModeGuard {
    /// Enable raw mode and switch to the alternate screen.
    ///
    /// Raw mode disables line buffering, local echo and signal generation,
    /// so Ctrl+C arrives as a key event.
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = Self;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(guard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best-effort restore - ignore errors during cleanup
        let _ = execute!(
            stdout(),
            crossterm::style::ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}
