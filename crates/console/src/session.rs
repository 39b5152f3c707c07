//! Per-console sessions and the registry that owns them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::capture::Capture;
use crate::error::ConsoleError;
use crate::host::{ConsoleId, GenerationToken};
use crate::interpreter::Interpreter;

/// One console's interpreter, its output capture and its pending lines.
pub struct Session {
    interpreter: Box<dyn Interpreter>,
    capture: Capture,
    /// Raw lines of the statement being entered, oldest first.
    pending: Vec<String>,
}

impl Session {
    pub fn new(interpreter: Box<dyn Interpreter>, capture: Capture) -> Self {
        Self {
            interpreter,
            capture,
            pending: Vec::new(),
        }
    }

    pub fn interpreter(&mut self) -> &mut dyn Interpreter {
        self.interpreter.as_mut()
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn pending_lines(&self) -> &[String] {
        &self.pending
    }

    /// Append `line` and return the candidate statement (all pending lines
    /// joined with newlines).
    pub fn push_line(&mut self, line: &str) -> String {
        self.pending.push(line.to_string());
        self.pending.join("\n")
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

/// Lazily created sessions keyed by console identifier.
///
/// The registry remembers the generation token it last saw. When a call
/// arrives with a different token every session is dropped, since they may
/// hold handles into a document that no longer exists.
#[derive(Default)]
pub struct SessionRegistry {
    generation: Option<GenerationToken>,
    sessions: HashMap<ConsoleId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `console_id`, creating it with `create` if
    /// needed. An existing session gets fresh output sinks.
    pub fn get_or_create<F>(
        &mut self,
        console_id: ConsoleId,
        generation: GenerationToken,
        create: F,
    ) -> Result<&mut Session, ConsoleError>
    where
        F: FnOnce() -> Result<Session, ConsoleError>,
    {
        if self.generation != Some(generation) {
            if !self.sessions.is_empty() {
                log::debug!(
                    "generation changed ({:?} -> {:?}), dropping {} session(s)",
                    self.generation,
                    generation,
                    self.sessions.len()
                );
            }
            self.sessions.clear();
            self.generation = Some(generation);
        }

        match self.sessions.entry(console_id) {
            Entry::Occupied(entry) => {
                let session = entry.into_mut();
                session.capture.renew();
                log::debug!("reusing session for console {:?}", console_id);
                Ok(session)
            }
            Entry::Vacant(entry) => {
                let session = create()?;
                log::debug!("created session for console {:?}", console_id);
                Ok(entry.insert(session))
            }
        }
    }

    pub fn get_mut(&mut self, console_id: ConsoleId) -> Option<&mut Session> {
        self.sessions.get_mut(&console_id)
    }

    pub fn get(&self, console_id: ConsoleId) -> Option<&Session> {
        self.sessions.get(&console_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::interpreter::Evaluated;

    /// Counts evaluations so tests can tell sessions apart.
    struct Counter(usize);

    impl Interpreter for Counter {
        fn eval(&mut self, _source: &str) -> Result<Evaluated, EvalError> {
            self.0 += 1;
            Ok(Evaluated::Value(self.0.to_string()))
        }

        fn members(&mut self, _path: &[String]) -> Result<Vec<String>, EvalError> {
            Ok(Vec::new())
        }

        fn banner(&self) -> String {
            String::new()
        }
    }

    fn counter() -> Result<Session, ConsoleError> {
        Ok(Session::new(Box::new(Counter(0)), Capture::new(10)))
    }

    #[test]
    fn test_same_console_reuses_session() {
        let mut registry = SessionRegistry::new();
        let id = ConsoleId(1);
        let gen = GenerationToken(1);

        let first = registry.get_or_create(id, gen, counter).unwrap();
        first.interpreter().eval("x").unwrap();
        let again = registry.get_or_create(id, gen, counter).unwrap();
        assert_eq!(
            again.interpreter().eval("x"),
            Ok(Evaluated::Value("2".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_generation_change_drops_sessions() {
        let mut registry = SessionRegistry::new();
        registry.get_or_create(ConsoleId(1), GenerationToken(1), counter).unwrap();
        registry.get_or_create(ConsoleId(2), GenerationToken(1), counter).unwrap();
        assert_eq!(registry.len(), 2);

        let fresh = registry
            .get_or_create(ConsoleId(1), GenerationToken(2), counter)
            .unwrap();
        assert_eq!(
            fresh.interpreter().eval("x"),
            Ok(Evaluated::Value("1".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reuse_renews_capture() {
        let mut registry = SessionRegistry::new();
        let id = ConsoleId(7);
        let gen = GenerationToken(1);
        let session = registry.get_or_create(id, gen, counter).unwrap();
        session.capture().write_stdout("left over\n");

        let session = registry.get_or_create(id, gen, counter).unwrap();
        assert!(session.capture().is_empty());
    }

    #[test]
    fn test_failed_creation_leaves_no_session() {
        let mut registry = SessionRegistry::new();
        let result = registry.get_or_create(ConsoleId(1), GenerationToken(1), || {
            Err(ConsoleError::Interpreter(EvalError::runtime("no interpreter")))
        });
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pending_lines_join() {
        let mut session = counter().unwrap();
        assert!(session.pending_lines().is_empty());
        assert_eq!(session.push_line("function f("), "function f(");
        assert_eq!(session.push_line("1 end"), "function f(\n1 end");
        assert_eq!(session.pending_lines().len(), 2);
        session.clear_pending();
        assert!(session.pending_lines().is_empty());
    }
}
