//! Host-side interfaces.
//!
//! The console never owns UI state. Everything it reads or writes on the
//! panel (current line, prompt, scrollback, history, clipboard) goes through
//! [`ConsoleHost`], which the embedding application implements.
//! [`MemoryHost`] is a complete in-memory implementation used by the
//! terminal front-end and the tests.

mod memory;

pub use memory::{MemoryHost, PanelHandle, StaticObject};

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Kind of a scrollback entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// Echoed user input, prompt included
    Input,
    /// Captured standard output and rendered results
    Output,
    /// Captured standard error and error reports
    Error,
    /// Completion listings and banner text
    Info,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "INPUT"),
            Self::Output => write!(f, "OUTPUT"),
            Self::Error => write!(f, "ERROR"),
            Self::Info => write!(f, "INFO"),
        }
    }
}

/// A single line of the host's scrollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollbackLine {
    pub kind: LineKind,
    pub text: String,
}

impl ScrollbackLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn input(text: impl Into<String>) -> Self {
        Self::new(LineKind::Input, text)
    }

    pub fn output(text: impl Into<String>) -> Self {
        Self::new(LineKind::Output, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(LineKind::Error, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(LineKind::Info, text)
    }
}

/// The line being edited: the last entry of the host's line history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLine {
    pub body: String,
    /// Cursor position (byte offset into `body`)
    pub cursor: usize,
}

impl HistoryLine {
    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        let cursor = body.len();
        Self { body, cursor }
    }
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Identifies one console instance. Each identifier gets its own session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsoleId(pub u64);

impl ConsoleId {
    /// Derive an identifier from any hashable value (a region, a file path...).
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        Self(hash_of(value))
    }
}

/// Changes whenever the host loads a new document. Sessions created under an
/// older token hold stale host handles and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationToken(pub u64);

impl GenerationToken {
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        Self(hash_of(value))
    }
}

/// Identity of the panel widget. If it differs before and after an
/// evaluation, the evaluated code replaced the UI and the old panel must
/// not be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelId(pub u64);

/// A host-owned object exposed read-only to the interpreter.
pub trait HostObject {
    /// Short type name shown by `tostring()` and `help()`.
    fn type_name(&self) -> &str;

    /// Look up an attribute. `None` means "no such attribute".
    fn attribute(&self, name: &str) -> Option<HostValue>;

    /// All attribute names, for completion and `help()`.
    fn attribute_names(&self) -> Vec<String>;
}

impl fmt::Debug for dyn HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.type_name())
    }
}

pub type HostHandle = Rc<dyn HostObject>;

/// A value read from a host object.
#[derive(Clone)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Object(HostHandle),
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "Nil"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Integer(i) => write!(f, "Integer({i})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Object(o) => write!(f, "Object({:?})", o),
        }
    }
}

/// The console panel as seen from the console.
///
/// Implementations are driven from the host's UI thread only; the console
/// never calls back into the host from another thread.
pub trait ConsoleHost {
    /// Which console this panel belongs to (selects the session).
    fn console_id(&self) -> ConsoleId;

    /// Identity of the panel widget itself.
    fn panel_id(&self) -> PanelId;

    /// Current document generation.
    fn generation(&self) -> GenerationToken;

    /// The line being edited, if the panel has one.
    fn current_line(&self) -> Option<HistoryLine>;

    /// Replace the body and cursor of the line being edited.
    fn set_current_line(&mut self, body: &str, cursor: usize);

    fn prompt(&self) -> String;

    fn set_prompt(&mut self, prompt: &str);

    /// Append one scrollback line. Use [`append_scrollback`] for text that
    /// may span several lines.
    fn append_scrollback_line(&mut self, text: &str, kind: LineKind);

    fn scrollback(&self) -> Vec<ScrollbackLine>;

    /// Start a new history line. With `remove_duplicates`, an earlier entry
    /// with the same body is dropped first.
    fn append_history(&mut self, body: &str, cursor: usize, remove_duplicates: bool);

    /// Move the selection by `offset` bytes (after completion edits the line).
    fn shift_selection(&mut self, offset: isize);

    fn request_redraw(&mut self);

    fn set_clipboard(&mut self, text: String);

    /// The host's "current context" singleton.
    fn context(&self) -> Option<HostHandle>;

    /// The host's "current document" singleton.
    fn document(&self) -> Option<HostHandle>;
}

/// Append possibly multi-line `text`, one scrollback entry per line.
///
/// A single trailing newline is ignored, tabs become four spaces. Empty
/// text still produces one (empty) entry.
pub fn append_scrollback<H: ConsoleHost + ?Sized>(host: &mut H, text: &str, kind: LineKind) {
    let text = text.strip_suffix('\n').unwrap_or(text);
    for line in text.split('\n') {
        host.append_scrollback_line(&line.replace('\t', "    "), kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_objects_debug_as_type_name() {
        let host = MemoryHost::new();
        let document = host.document().unwrap();
        assert_eq!(format!("{:?}", document), "<Document>");
        assert_eq!(
            format!("{:?}", HostValue::Object(document)),
            "Object(<Document>)"
        );
        assert!(format!("{:?}", host).contains("context: <Context>"));
    }

    #[test]
    fn test_append_scrollback_splits_lines() {
        let mut host = MemoryHost::new();
        append_scrollback(&mut host, "one\ntwo\n", LineKind::Output);
        assert_eq!(
            host.scrollback(),
            vec![ScrollbackLine::output("one"), ScrollbackLine::output("two")]
        );
    }

    #[test]
    fn test_append_scrollback_expands_tabs() {
        let mut host = MemoryHost::new();
        append_scrollback(&mut host, "a\tb", LineKind::Error);
        assert_eq!(host.scrollback(), vec![ScrollbackLine::error("a    b")]);
    }

    #[test]
    fn test_append_scrollback_empty_text_gives_one_line() {
        let mut host = MemoryHost::new();
        append_scrollback(&mut host, "", LineKind::Output);
        assert_eq!(host.scrollback(), vec![ScrollbackLine::output("")]);
    }

    #[test]
    fn test_console_id_is_stable() {
        assert_eq!(ConsoleId::of("region-1"), ConsoleId::of("region-1"));
        assert_ne!(ConsoleId::of("region-1"), ConsoleId::of("region-2"));
    }
}
