//! Feeding a script file through the console one line at a time, the same
//! way a user typing into the panel would.

use std::io::{self, Write};

use conbridge_console::{Console, ConsoleHost, ExecStatus, MemoryHost};

use crate::transcript::{Mode, Transcript};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Physical lines fed to the console.
    pub lines: usize,
    /// Error entries the script produced.
    pub errors: usize,
    /// Lines of a statement still waiting for its end when the file ran out.
    pub unfinished: Vec<String>,
}

/// Run `source` and print the transcript (banner excluded) to `out`.
pub fn run_script<O: Write, E: Write>(
    console: &mut Console,
    host: &mut MemoryHost,
    source: &str,
    out: &mut O,
    err: &mut E,
) -> io::Result<ScriptReport> {
    console.banner(host);
    let mut transcript = Transcript::starting_at(Mode::Script, host);

    let mut lines = 0;
    for line in source.lines() {
        host.set_input(line);
        if console.execute(host) == ExecStatus::Cancelled {
            log::warn!("line {} was not executed", lines + 1);
        }
        transcript.flush(host, out, err)?;
        lines += 1;
    }

    let unfinished = console.pending_lines(host.console_id()).to_vec();
    log::debug!(
        "script done: {} lines, {} errors, {} unfinished",
        lines,
        transcript.error_count(),
        unfinished.len()
    );
    Ok(ScriptReport {
        lines,
        errors: transcript.error_count(),
        unfinished,
    })
}

/// Run `source` silently and return the transcript rendered as a script.
pub fn export_script(
    console: &mut Console,
    host: &mut MemoryHost,
    source: &str,
) -> io::Result<(ScriptReport, String)> {
    let report = run_script(console, host, source, &mut io::sink(), &mut io::sink())?;
    console.copy_as_script(host);
    let script = host.clipboard().unwrap_or_default().to_string();
    Ok((report, script))
}
