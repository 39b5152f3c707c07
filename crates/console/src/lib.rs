//! Console bridge for an embedded Lua interpreter.
//!
//! The host application owns the console panel (line history, prompt,
//! scrollback) and calls into [`Console`] one line at a time:
//!
//! - [`Console::execute`] evaluates the current line, buffering lines of an
//!   unfinished statement until it parses.
//! - [`Console::autocomplete`] expands the word at the cursor.
//! - [`Console::copy_as_script`] puts the transcript on the clipboard as a
//!   runnable script.
//! - [`Console::banner`] prints the interpreter banner.
//!
//! Each console identifier gets its own session, and all sessions are
//! dropped when the host loads a new document.

pub mod capture;
pub mod complete;
mod error;
pub mod executor;
pub mod export;
pub mod host;
pub mod interpreter;
pub mod lua;
pub mod session;
pub mod stdin;

pub use capture::{Capture, Captured, OutputSink};
pub use complete::{CompletionEngine, Expansion, NameCompleter};
pub use error::{
    catch_panic, CompletionError, ConsoleError, EvalError, EvalErrorKind, StdinError,
};
pub use executor::{Console, ExecStatus, PostExecHook};
pub use host::{
    append_scrollback, ConsoleHost, ConsoleId, GenerationToken, HistoryLine, HostHandle,
    HostObject, HostValue, LineKind, MemoryHost, PanelHandle, PanelId, ScrollbackLine,
    StaticObject,
};
pub use interpreter::{Evaluated, Interpreter, InterpreterFactory, SessionSeed};
pub use lua::{LuaFactory, LuaInterpreter, LuaLimits};
pub use session::{Session, SessionRegistry};
pub use stdin::{InputSource, ReaderInput, ScriptedInput, StdinGuard, StdinSlot};

pub use conbridge_config::ConsoleSettings;
