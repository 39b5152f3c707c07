//! Printing console scrollback to the terminal.
//!
//! The console writes into the host's scrollback; the terminal host prints
//! whatever was appended since the last flush.

use std::io::{self, Write};

use conbridge_console::{LineKind, MemoryHost};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Every entry goes to stdout in order, input echoes included.
    Script,
    /// The user already sees what they typed: input echoes are skipped and
    /// errors go to stderr.
    Interactive,
}

#[derive(Debug)]
pub struct Transcript {
    mode: Mode,
    printed: usize,
    errors: usize,
}

impl Transcript {
    pub fn new(mode: Mode) -> Self {
        Self { mode, printed: 0, errors: 0 }
    }

    /// Skip everything already in the scrollback.
    pub fn starting_at(mode: Mode, host: &MemoryHost) -> Self {
        Self { mode, printed: host.scrollback_len(), errors: 0 }
    }

    pub fn flush<O: Write, E: Write>(
        &mut self,
        host: &MemoryHost,
        out: &mut O,
        err: &mut E,
    ) -> io::Result<()> {
        for line in host.scrollback_since(self.printed) {
            if line.kind == LineKind::Error {
                self.errors += 1;
            }
            match (self.mode, line.kind) {
                (Mode::Interactive, LineKind::Input) => {}
                (Mode::Interactive, LineKind::Error) => writeln!(err, "{}", line.text)?,
                _ => writeln!(out, "{}", line.text)?,
            }
        }
        self.printed = host.scrollback_len();
        out.flush()?;
        err.flush()
    }

    /// Error entries seen so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }
}
