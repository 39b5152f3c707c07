// conbridge - terminal host for the embedded Lua console
//
// Plays the part of the application panel: owns the line history, prompt
// and scrollback (a MemoryHost), and drives the console one line at a time.

mod exit_codes;
mod repl;
mod script;
mod transcript;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use conbridge_config::{ConfigError, ConsoleSettings};
use conbridge_console::{Console, MemoryHost, ReaderInput};

use exit_codes::{EXIT_CONFIG, EXIT_INCOMPLETE, EXIT_IO, EXIT_SCRIPT_ERROR, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "conbridge")]
#[command(about = "Embedded Lua console, driven from the terminal")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file to use instead of the one in the user config directory
    #[arg(long, global = true, value_name = "PATH", env = "CONBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log session and completion activity to stderr (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console (the default when no command is given)
    #[command(after_help = "\
Meta-commands inside the console:
  :complete <text>   Tab-complete <text>
  :copy              Print the session as a runnable script
  :reload            Load a new document (resets sessions)
  :quit              Exit")]
    Repl,

    /// Feed a file through the console line by line and print the transcript
    #[command(after_help = "\
Exit codes:
  0  every line ran without error output
  1  at least one line reported an error
  5  the file ended inside an unfinished statement")]
    Run {
        /// Lua source, one console line per line
        file: PathBuf,
    },

    /// Run a file silently, then print the transcript as a runnable script
    /// with output and error markers
    Export {
        /// Lua source, one console line per line
        file: PathBuf,

        /// Write the script here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print the settings file path and the effective settings
    Config,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ninterpreter: ", env!("BUNDLED_LUA"),
        "\ntarget:      ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_settings(cli.config.as_deref()).and_then(|settings| {
        match cli.command.unwrap_or(Commands::Repl) {
            Commands::Repl => cmd_repl(settings),
            Commands::Run { file } => cmd_run(settings, &file),
            Commands::Export { file, output } => cmd_export(settings, &file, output.as_deref()),
            Commands::Config => cmd_config(&settings, cli.config.as_deref()),
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = &e.hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Io { .. } => None,
            ConfigError::Parse { .. } => {
                Some("settings are JSON; `//` comment lines are allowed".to_string())
            }
            ConfigError::Validation(_) => {
                Some("fix the value, or remove the key to use its default".to_string())
            }
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_settings(path: Option<&Path>) -> Result<ConsoleSettings, CliError> {
    match path {
        Some(path) => ConsoleSettings::load_from(path).map_err(CliError::config),
        None => Ok(ConsoleSettings::load()),
    }
}

fn read_script(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))
}

fn check_report(report: &script::ScriptReport, path: &Path) -> Result<(), CliError> {
    if !report.unfinished.is_empty() {
        return Err(CliError::new(
            EXIT_INCOMPLETE,
            format!(
                "{} ended inside an unfinished statement ({} pending line(s))",
                path.display(),
                report.unfinished.len()
            ),
        )
        .with_hint(format!("statement starts with: {}", report.unfinished[0].trim())));
    }
    if report.errors > 0 {
        return Err(CliError::new(
            EXIT_SCRIPT_ERROR,
            format!("{} reported {} error line(s)", path.display(), report.errors),
        ));
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_repl(settings: ConsoleSettings) -> Result<(), CliError> {
    let mut console = Console::new(settings);
    let mut host = MemoryHost::new();
    console
        .stdin()
        .attach(Box::new(ReaderInput::new(io::stdin().lock())));

    let stdout = io::stdout();
    let stderr = io::stderr();
    repl::run_repl(&mut console, &mut host, &mut stdout.lock(), &mut stderr.lock())
        .map_err(|e| CliError::io(e.to_string()))
}

fn cmd_run(settings: ConsoleSettings, file: &Path) -> Result<(), CliError> {
    let source = read_script(file)?;
    let mut console = Console::new(settings);
    let mut host = MemoryHost::new();

    let stdout = io::stdout();
    let stderr = io::stderr();
    let report = script::run_script(
        &mut console,
        &mut host,
        &source,
        &mut stdout.lock(),
        &mut stderr.lock(),
    )
    .map_err(|e| CliError::io(e.to_string()))?;

    check_report(&report, file)
}

fn cmd_export(
    settings: ConsoleSettings,
    file: &Path,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let source = read_script(file)?;
    let mut console = Console::new(settings);
    let mut host = MemoryHost::new();

    let (report, text) = script::export_script(&mut console, &mut host, &source)
        .map_err(|e| CliError::io(e.to_string()))?;

    match output {
        Some(path) => fs::write(path, format!("{}\n", text))
            .map_err(|e| CliError::io(format!("cannot write {}: {}", path.display(), e)))?,
        None => {
            let stdout = io::stdout();
            writeln!(stdout.lock(), "{}", text).map_err(|e| CliError::io(e.to_string()))?;
        }
    }

    // A script with errors still exports; an unfinished one is flagged.
    if !report.unfinished.is_empty() {
        check_report(&report, file)?;
    }
    Ok(())
}

fn cmd_config(settings: &ConsoleSettings, path: Option<&Path>) -> Result<(), CliError> {
    let location = match path {
        Some(path) => path.display().to_string(),
        None => ConsoleSettings::config_path_display(),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "# {}", location).map_err(|e| CliError::io(e.to_string()))?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CliError::new(EXIT_CONFIG, e.to_string()))?;
    writeln!(out, "{}", json).map_err(|e| CliError::io(e.to_string()))
}
