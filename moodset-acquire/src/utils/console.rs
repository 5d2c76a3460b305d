//! Console clearing capability
//!
//! The caller picks the implementation; the pipeline never probes the
//! terminal itself.

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};

/// Something that can wipe interactive progress output
pub trait ConsoleOutput: Send + Sync {
    fn clear(&self);
}

/// Does nothing; used outside a terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConsole;

impl ConsoleOutput for NoopConsole {
    fn clear(&self) {}
}

/// Clears the attached terminal with crossterm
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsole;

impl ConsoleOutput for TerminalConsole {
    fn clear(&self) {
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)) {
            tracing::debug!(error = %e, "Terminal clear failed");
        }
        let _ = stdout.flush();
    }
}
