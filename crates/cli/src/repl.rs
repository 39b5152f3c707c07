//! Interactive terminal loop around the console.
//!
//! Lines starting with `:` are meta-commands that stand in for the panel's
//! buttons and key bindings (Tab completion, copy, new document). Lua's
//! `::label::` syntax is passed through untouched.

use std::io::{self, Write};

use conbridge_console::{Console, ConsoleHost, MemoryHost};

use crate::transcript::{Mode, Transcript};

const REPL_HELP: &str = "\
Meta-commands:
  :complete <text>   Complete <text> as if Tab was pressed at its end
  :copy              Print the session as a runnable script
  :reload            Load a new document (resets every session)
  :help              Show this help
  :quit              Exit (end of input works too)

Anything else is sent to the console. Type help() for the Lua bindings.";

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Quit,
    Help,
    Copy,
    Reload,
    Complete(&'a str),
}

#[derive(Debug, PartialEq, Eq)]
enum ParsedCommand<'a> {
    NotACommand,
    UnknownCommand,
    InvalidUsage(&'static str),
    Command(ReplCommand<'a>),
}

fn parse_repl_command(line: &str) -> ParsedCommand<'_> {
    let trimmed = line.trim();
    if !trimmed.starts_with(':') || trimmed.starts_with("::") {
        return ParsedCommand::NotACommand;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let arg = parts
        .next()
        .map(str::trim_start)
        .filter(|value| !value.is_empty());

    match cmd {
        ":quit" | ":q" => ParsedCommand::Command(ReplCommand::Quit),
        ":help" | ":h" => ParsedCommand::Command(ReplCommand::Help),
        ":copy" => ParsedCommand::Command(ReplCommand::Copy),
        ":reload" => ParsedCommand::Command(ReplCommand::Reload),
        ":complete" | ":c" => match arg {
            Some(text) => ParsedCommand::Command(ReplCommand::Complete(text)),
            None => ParsedCommand::InvalidUsage("Usage: :complete <text>"),
        },
        _ => ParsedCommand::UnknownCommand,
    }
}

/// Run the loop until `:quit` or end of input.
///
/// Lines are read through the console's stdin slot, so the interpreter
/// never sees them: the slot is suppressed while a line is evaluated.
pub fn run_repl<O: Write, E: Write>(
    console: &mut Console,
    host: &mut MemoryHost,
    out: &mut O,
    err: &mut E,
) -> io::Result<()> {
    let mut transcript = Transcript::new(Mode::Interactive);
    console.banner(host);
    transcript.flush(host, out, err)?;
    writeln!(out, "Type :help for meta-commands, :quit to exit.")?;

    loop {
        write!(out, "{}", host.prompt())?;
        out.flush()?;

        let line = match console.stdin().read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                writeln!(out)?;
                break;
            }
            Err(e) => return Err(io::Error::other(e.to_string())),
        };

        match parse_repl_command(&line) {
            ParsedCommand::NotACommand => {
                host.set_input(&line);
                console.execute(host);
            }
            ParsedCommand::Command(ReplCommand::Quit) => break,
            ParsedCommand::Command(ReplCommand::Help) => writeln!(out, "{}", REPL_HELP)?,
            ParsedCommand::Command(ReplCommand::Copy) => {
                console.copy_as_script(host);
                writeln!(out, "{}", host.clipboard().unwrap_or_default())?;
            }
            ParsedCommand::Command(ReplCommand::Reload) => {
                host.reload();
                writeln!(out, "New document loaded; sessions were reset.")?;
            }
            ParsedCommand::Command(ReplCommand::Complete(text)) => {
                host.set_input(text);
                console.autocomplete(host);
                transcript.flush(host, out, err)?;
                if let Some(current) = host.current_line() {
                    writeln!(out, "=> {}", current.body)?;
                }
            }
            ParsedCommand::UnknownCommand => {
                writeln!(err, "unknown command {} (type :help)", line.trim())?;
            }
            ParsedCommand::InvalidUsage(usage) => writeln!(err, "{}", usage)?,
        }
        transcript.flush(host, out, err)?;
    }
    Ok(())
}
