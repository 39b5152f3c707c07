//! Line executor and the console entry points the host calls.
//!
//! The host hands over one physical line at a time. Each line is appended
//! to the session's pending lines and the joined text is evaluated. An
//! incomplete-input failure keeps the lines and switches to the
//! continuation prompt; success or any other failure clears them.

use conbridge_config::ConsoleSettings;

use crate::capture::{Capture, Captured};
use crate::complete::{CompletionEngine, NameCompleter};
use crate::error::{catch_panic, ConsoleError};
use crate::export;
use crate::host::{append_scrollback, ConsoleHost, ConsoleId, LineKind};
use crate::interpreter::{Evaluated, InterpreterFactory, SessionSeed};
use crate::lua::{LuaFactory, LuaLimits};
use crate::session::{Session, SessionRegistry};
use crate::stdin::StdinSlot;

/// Outcome of a console entry point, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Finished,
    /// Nothing was done (the panel has no current line).
    Cancelled,
}

/// Called after every executed line, in registration order.
pub type PostExecHook = Box<dyn FnMut()>;

/// How the last evaluation left the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Done,
    /// Finished with the interpreter's null value.
    Nothing,
    /// More lines are needed.
    Continue,
}

struct LineOutcome {
    state: LineState,
    captured: Captured,
}

/// The console bridge: sessions, line execution, completion and export.
pub struct Console {
    settings: ConsoleSettings,
    registry: SessionRegistry,
    factory: Box<dyn InterpreterFactory>,
    completer: Box<dyn CompletionEngine>,
    stdin: StdinSlot,
    hooks: Vec<PostExecHook>,
}

impl Console {
    /// A console running Lua sessions.
    pub fn new(settings: ConsoleSettings) -> Self {
        let factory = LuaFactory::new(LuaLimits::from_settings(&settings));
        Self::with_factory(settings, factory)
    }

    /// A console running sessions created by `factory`.
    pub fn with_factory(settings: ConsoleSettings, factory: impl InterpreterFactory + 'static) -> Self {
        Self {
            settings,
            registry: SessionRegistry::new(),
            factory: Box::new(factory),
            completer: Box::new(NameCompleter),
            stdin: StdinSlot::new(),
            hooks: Vec::new(),
        }
    }

    pub fn set_completer(&mut self, engine: impl CompletionEngine + 'static) {
        self.completer = Box::new(engine);
    }

    pub fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    /// The interpreter-visible standard input. Attach a source here; it is
    /// disabled during every console call regardless.
    pub fn stdin(&self) -> &StdinSlot {
        &self.stdin
    }

    /// Register a callback run after every executed line.
    pub fn add_hook(&mut self, hook: impl FnMut() + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Lines of the statement still being entered on `console_id`.
    pub fn pending_lines(&self, console_id: ConsoleId) -> &[String] {
        self.registry
            .get(console_id)
            .map(Session::pending_lines)
            .unwrap_or(&[])
    }

    /// Execute the host's current line.
    pub fn execute<H: ConsoleHost + ?Sized>(&mut self, host: &mut H) -> ExecStatus {
        let Some(line) = host.current_line() else {
            return ExecStatus::Cancelled;
        };
        let console_id = host.console_id();
        let panel = host.panel_id();

        let result = catch_panic(|| self.evaluate_line(&*host, &line.body)).and_then(|r| r);
        let LineOutcome { state, captured } = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("console {:?}: {}", console_id, e);
                if let Some(session) = self.registry.get_mut(console_id) {
                    session.clear_pending();
                }
                LineOutcome {
                    state: LineState::Done,
                    captured: Captured {
                        stdout: String::new(),
                        stderr: format!("{}\n", e),
                    },
                }
            }
        };

        // The evaluated code may have replaced the panel
        if host.panel_id() != panel {
            log::warn!("console panel changed during evaluation, output not shown");
            return ExecStatus::Finished;
        }

        let echo = format!("{}{}", host.prompt(), line.body);
        host.append_scrollback_line(&echo, LineKind::Input);

        let prompt = match state {
            LineState::Continue => &self.settings.prompt_continuation,
            LineState::Done | LineState::Nothing => &self.settings.prompt_primary,
        };
        host.set_prompt(prompt);

        // New blank line to type into
        host.append_history("", 0, true);

        if !captured.stdout.is_empty() {
            append_scrollback(host, &captured.stdout, LineKind::Output);
        } else if state == LineState::Nothing {
            host.append_scrollback_line("", LineKind::Output);
        }
        if !captured.stderr.is_empty() {
            append_scrollback(host, &captured.stderr, LineKind::Error);
        }

        self.run_hooks(host);
        ExecStatus::Finished
    }

    fn evaluate_line<H: ConsoleHost + ?Sized>(
        &mut self,
        host: &H,
        body: &str,
    ) -> Result<LineOutcome, ConsoleError> {
        let _stdin = self.stdin.suppress();

        let session = open_session(
            &mut self.registry,
            self.factory.as_ref(),
            &self.stdin,
            self.settings.max_output_lines,
            host,
        )?;

        let candidate = session.push_line(body);
        let state = match session.interpreter().eval(&candidate) {
            Ok(value) => {
                session.clear_pending();
                if let Evaluated::Value(text) = &value {
                    session.capture().write_stdout(&format!("{}\n", text));
                }
                if value.is_nothing() {
                    LineState::Nothing
                } else {
                    LineState::Done
                }
            }
            Err(e) if e.is_incomplete() => {
                log::debug!(
                    "statement incomplete, {} line(s) pending",
                    session.pending_lines().len()
                );
                LineState::Continue
            }
            Err(e) => {
                session.clear_pending();
                session.capture().write_stderr(&format!("{}\n", e));
                LineState::Done
            }
        };

        Ok(LineOutcome {
            state,
            captured: session.capture().take(),
        })
    }

    fn run_hooks<H: ConsoleHost + ?Sized>(&mut self, host: &mut H) {
        if !self.hooks.is_empty() {
            log::debug!("running {} post-execution hook(s)", self.hooks.len());
        }
        for hook in self.hooks.iter_mut() {
            if let Err(e) = catch_panic(|| hook()) {
                append_scrollback(host, &e.to_string(), LineKind::Error);
            }
        }
    }

    /// Complete the word before the cursor on the host's current line.
    ///
    /// Input stays disabled for the whole call and the host is asked to
    /// redraw however the call ends.
    pub fn autocomplete<H: ConsoleHost + ?Sized>(&mut self, host: &mut H) -> ExecStatus {
        let status = {
            let _stdin = self.stdin.suppress();
            match catch_panic(|| self.complete_line(&mut *host)) {
                Ok(status) => status,
                Err(e) => {
                    append_scrollback(host, &e.to_string(), LineKind::Error);
                    ExecStatus::Finished
                }
            }
        };
        host.request_redraw();
        status
    }

    fn complete_line<H: ConsoleHost + ?Sized>(&mut self, host: &mut H) -> ExecStatus {
        let Some(current) = host.current_line() else {
            return ExecStatus::Cancelled;
        };

        let expansion = open_session(
            &mut self.registry,
            self.factory.as_ref(),
            &self.stdin,
            self.settings.max_output_lines,
            &*host,
        )
        .and_then(|session| {
            self.completer
                .expand(
                    &current.body,
                    current.cursor,
                    session.interpreter(),
                    self.settings.show_private,
                )
                .map_err(ConsoleError::from)
        });

        match expansion {
            Ok(expansion) => {
                let changed = expansion.line != current.body;
                let offset = expansion.line.len() as isize - current.body.len() as isize;
                host.set_current_line(&expansion.line, expansion.cursor);
                host.shift_selection(offset);

                // Show what was typed before the listing or the rewrite
                if changed || !expansion.suggestions.is_empty() {
                    let echo = format!("{}{}", host.prompt(), current.body);
                    host.append_scrollback_line(&echo, LineKind::Input);
                }
                if !expansion.suggestions.is_empty() {
                    append_scrollback(host, &expansion.suggestions, LineKind::Info);
                }
            }
            Err(e) => {
                log::warn!("autocomplete failed: {}", e);
                append_scrollback(host, &e.to_string(), LineKind::Error);
            }
        }
        ExecStatus::Finished
    }

    /// Put the transcript, rendered as a script, on the host clipboard.
    pub fn copy_as_script<H: ConsoleHost + ?Sized>(&self, host: &mut H) -> ExecStatus {
        let script = export::copy_as_script(&host.scrollback(), &self.settings);
        host.set_clipboard(script);
        ExecStatus::Finished
    }

    /// Show the interpreter banner and reset to the primary prompt.
    pub fn banner<H: ConsoleHost + ?Sized>(&mut self, host: &mut H) -> ExecStatus {
        let result = catch_panic(|| {
            let _stdin = self.stdin.suppress();
            open_session(
                &mut self.registry,
                self.factory.as_ref(),
                &self.stdin,
                self.settings.max_output_lines,
                &*host,
            )
            .map(|session| session.interpreter().banner())
        })
        .and_then(|r| r);

        match result {
            Ok(text) => append_scrollback(host, &text, LineKind::Info),
            Err(e) => append_scrollback(host, &e.to_string(), LineKind::Error),
        }
        host.set_prompt(&self.settings.prompt_primary);
        ExecStatus::Finished
    }
}

/// Look up or create the session for the host's console.
fn open_session<'a, H: ConsoleHost + ?Sized>(
    registry: &'a mut SessionRegistry,
    factory: &dyn InterpreterFactory,
    stdin: &StdinSlot,
    max_output_lines: usize,
    host: &H,
) -> Result<&'a mut Session, ConsoleError> {
    registry.get_or_create(host.console_id(), host.generation(), || {
        let capture = Capture::new(max_output_lines);
        let seed = SessionSeed {
            capture: capture.clone(),
            stdin: stdin.clone(),
            context: host.context(),
            document: host.document(),
        };
        let interpreter = factory.create(seed)?;
        Ok(Session::new(interpreter, capture))
    })
}
