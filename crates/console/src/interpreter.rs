//! The embedded interpreter as seen by the console.

use crate::capture::Capture;
use crate::error::EvalError;
use crate::host::HostHandle;
use crate::stdin::StdinSlot;

/// Rendered result of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluated {
    /// The statement produced no value at all.
    Empty,
    /// The statement produced the interpreter's null value (`nil`).
    Nothing,
    /// Display text of the produced value(s).
    Value(String),
}

impl Evaluated {
    /// Text written to the scrollback for this result. Both `Empty` and
    /// `Nothing` render as the empty string.
    pub fn render(&self) -> &str {
        match self {
            Self::Empty | Self::Nothing => "",
            Self::Value(text) => text,
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}

/// One session's interpreter state.
pub trait Interpreter {
    /// Evaluate a complete candidate statement.
    ///
    /// Returns an [`EvalErrorKind::Incomplete`](crate::EvalErrorKind) error
    /// when the statement parses so far but needs more lines.
    fn eval(&mut self, source: &str) -> Result<Evaluated, EvalError>;

    /// Names reachable under a dotted path in the session namespace.
    /// An empty path lists the globals.
    fn members(&mut self, path: &[String]) -> Result<Vec<String>, EvalError>;

    /// Text shown when the console starts.
    fn banner(&self) -> String;
}

/// Everything a new session's interpreter is wired to.
#[derive(Clone)]
pub struct SessionSeed {
    /// Destination of the interpreter's standard output and error.
    pub capture: Capture,
    /// Source of the interpreter's standard input.
    pub stdin: StdinSlot,
    /// Host "current context" singleton.
    pub context: Option<HostHandle>,
    /// Host "current document" singleton.
    pub document: Option<HostHandle>,
}

/// Creates an interpreter for each new session.
pub trait InterpreterFactory {
    fn create(&self, seed: SessionSeed) -> Result<Box<dyn Interpreter>, EvalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(Evaluated::Empty.render(), "");
        assert_eq!(Evaluated::Nothing.render(), "");
        assert_eq!(Evaluated::Value("nil".to_string()).render(), "nil");
        assert!(Evaluated::Nothing.is_nothing());
        assert!(!Evaluated::Value(String::new()).is_nothing());
    }
}
