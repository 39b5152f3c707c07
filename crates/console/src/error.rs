use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Classification of an evaluation failure reported by the interpreter binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// The statement parsed so far is valid but unfinished. More lines are needed.
    Incomplete,
    /// The statement can never parse, no matter what follows.
    Syntax,
    /// Raised while running (including `error()` calls from user code).
    Runtime,
    /// Allocation failure inside the interpreter.
    Memory,
    /// Instruction budget, wall-clock timeout or cancellation.
    Limit,
    /// Anything else the binding could not classify.
    Internal,
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete input"),
            Self::Syntax => write!(f, "syntax error"),
            Self::Runtime => write!(f, "runtime error"),
            Self::Memory => write!(f, "memory error"),
            Self::Limit => write!(f, "limit exceeded"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

/// A failed evaluation, as reported by an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Incomplete, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Syntax, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Runtime, message)
    }

    /// True when the failure only means "keep reading lines".
    pub fn is_incomplete(&self) -> bool {
        self.kind == EvalErrorKind::Incomplete
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Failures of the bridging code itself, as opposed to user code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// The interpreter could not be created or configured.
    Interpreter(EvalError),
    /// The completion engine failed.
    Completion(String),
    /// A panic was caught at the host boundary.
    Panic(String),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interpreter(e) => write!(f, "interpreter setup failed: {e}"),
            Self::Completion(msg) => write!(f, "completion failed: {msg}"),
            Self::Panic(msg) => write!(f, "panic: {msg}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

impl From<EvalError> for ConsoleError {
    fn from(e: EvalError) -> Self {
        Self::Interpreter(e)
    }
}

/// Errors reading the interpreter-visible standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinError {
    /// Input is suppressed (a console call is running) or was never attached.
    Disabled,
    /// The underlying source failed.
    Io(String),
}

impl fmt::Display for StdinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "standard input is not available in the console"),
            Self::Io(msg) => write!(f, "standard input error: {msg}"),
        }
    }
}

impl std::error::Error for StdinError {}

/// Errors from a [`CompletionEngine`](crate::CompletionEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// Cursor is not on a char boundary or is past the end of the line.
    BadCursor { cursor: usize, len: usize },
    /// Looking up names in the namespace failed.
    Namespace(EvalError),
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadCursor { cursor, len } => {
                write!(f, "cursor {cursor} is not a valid position in a line of {len} bytes")
            }
            Self::Namespace(e) => write!(f, "namespace lookup failed: {e}"),
        }
    }
}

impl std::error::Error for CompletionError {}

impl From<CompletionError> for ConsoleError {
    fn from(e: CompletionError) -> Self {
        Self::Completion(e.to_string())
    }
}

/// Run `f`, turning an unwinding panic into [`ConsoleError::Panic`].
///
/// Used around every call into interpreter or completion code so a bug
/// there never unwinds into the host's event loop.
pub fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, ConsoleError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        log::warn!("caught panic at console boundary: {message}");
        ConsoleError::Panic(message)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
