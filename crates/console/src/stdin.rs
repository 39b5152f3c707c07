//! Interpreter-visible standard input.
//!
//! Console calls run on the host's UI thread, which cannot service an
//! interactive read. Every evaluation and completion holds a [`StdinGuard`]
//! so reads fail with [`StdinError::Disabled`] instead of blocking.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::BufRead;
use std::rc::Rc;

use crate::error::StdinError;

/// Something the interpreter can read lines from.
pub trait InputSource {
    /// Next line without its terminator, or `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>, StdinError>;
}

/// Lines fed from memory.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&mut self) -> Result<Option<String>, StdinError> {
        Ok(self.lines.pop_front())
    }
}

/// Lines read from any buffered reader (the process stdin in the terminal host).
pub struct ReaderInput<R> {
    reader: R,
}

impl<R: BufRead> ReaderInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> InputSource for ReaderInput<R> {
    fn read_line(&mut self) -> Result<Option<String>, StdinError> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Ok(Some(line))
            }
            Err(e) => Err(StdinError::Io(e.to_string())),
        }
    }
}

/// Shared, swappable slot holding the current input source.
///
/// Clones share the slot. An empty slot means input is disabled.
#[derive(Clone, Default)]
pub struct StdinSlot {
    source: Rc<RefCell<Option<Box<dyn InputSource>>>>,
}

impl std::fmt::Debug for StdinSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinSlot")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl StdinSlot {
    /// An empty (disabled) slot.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: Box<dyn InputSource>) -> Self {
        let slot = Self::new();
        slot.attach(source);
        slot
    }

    /// Install `source`, returning the previous one.
    pub fn attach(&self, source: Box<dyn InputSource>) -> Option<Box<dyn InputSource>> {
        self.source.borrow_mut().replace(source)
    }

    pub fn is_enabled(&self) -> bool {
        self.source.borrow().is_some()
    }

    /// Read one line from the current source.
    pub fn read_line(&self) -> Result<Option<String>, StdinError> {
        match self.source.borrow_mut().as_mut() {
            Some(source) => source.read_line(),
            None => Err(StdinError::Disabled),
        }
    }

    /// Disable input until the returned guard is dropped.
    pub fn suppress(&self) -> StdinGuard {
        let saved = self.source.borrow_mut().take();
        StdinGuard {
            slot: self.clone(),
            saved,
        }
    }
}

/// Restores the suppressed input source on drop, including during unwinding.
#[must_use = "input is restored as soon as the guard is dropped"]
pub struct StdinGuard {
    slot: StdinSlot,
    saved: Option<Box<dyn InputSource>>,
}

impl Drop for StdinGuard {
    fn drop(&mut self) {
        *self.slot.source.borrow_mut() = self.saved.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn test_empty_slot_is_disabled() {
        let slot = StdinSlot::new();
        assert_eq!(slot.read_line(), Err(StdinError::Disabled));
    }

    #[test]
    fn test_guard_disables_then_restores() {
        let slot = StdinSlot::with_source(Box::new(ScriptedInput::new(["first", "second"])));
        {
            let _guard = slot.suppress();
            assert!(!slot.is_enabled());
            assert_eq!(slot.read_line(), Err(StdinError::Disabled));
        }
        assert_eq!(slot.read_line(), Ok(Some("first".to_string())));
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let slot = StdinSlot::with_source(Box::new(ScriptedInput::new(["kept"])));
        let inner = slot.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(move || {
            let _guard = inner.suppress();
            panic!("evaluation blew up");
        }));
        assert!(result.is_err());
        assert_eq!(slot.read_line(), Ok(Some("kept".to_string())));
    }

    #[test]
    fn test_nested_guards() {
        let slot = StdinSlot::with_source(Box::new(ScriptedInput::new(["x"])));
        let outer = slot.suppress();
        {
            let _inner = slot.suppress();
        }
        assert!(!slot.is_enabled());
        drop(outer);
        assert!(slot.is_enabled());
    }

    #[test]
    fn test_reader_input_strips_terminators() {
        let mut input = ReaderInput::new(Cursor::new("one\r\ntwo\n"));
        assert_eq!(input.read_line(), Ok(Some("one".to_string())));
        assert_eq!(input.read_line(), Ok(Some("two".to_string())));
        assert_eq!(input.read_line(), Ok(None));
    }
}
