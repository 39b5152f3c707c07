// Shared helpers for console integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use conbridge_console::{
    Capture, ConsoleHost, EvalError, Evaluated, Interpreter, InterpreterFactory, LineKind,
    MemoryHost, PanelHandle, ScrollbackLine, SessionSeed, StdinSlot,
};

/// Interpreter driven by keywords in the submitted text. Records every
/// statement it is asked to evaluate.
///
/// - ends with `(`        -> incomplete
/// - contains `boom`      -> runtime error "boom"
/// - `nothing`            -> null result
/// - ends with `panic`    -> panics
/// - `read`               -> reads a line from stdin
/// - `print:<text>`       -> writes `<text>` to stdout, no value
/// - `swap-panel`         -> replaces the host panel
/// - `set <n>` / `get`    -> session-local state
/// - anything else        -> echoes the statement as the value
pub struct Recording {
    log: Rc<RefCell<Vec<String>>>,
    capture: Capture,
    stdin: StdinSlot,
    panel: Option<PanelHandle>,
    value: Option<String>,
}

impl Interpreter for Recording {
    fn eval(&mut self, source: &str) -> Result<Evaluated, EvalError> {
        self.log.borrow_mut().push(source.to_string());

        if source.ends_with('(') {
            return Err(EvalError::incomplete("'<name>' expected near <eof>"));
        }
        if source.ends_with("panic") {
            panic!("interpreter bug");
        }
        if source.contains("boom") {
            return Err(EvalError::runtime("boom"));
        }
        if let Some(text) = source.strip_prefix("print:") {
            self.capture.write_stdout(&format!("{}\n", text));
            return Ok(Evaluated::Empty);
        }
        if let Some(value) = source.strip_prefix("set ") {
            self.value = Some(value.to_string());
            return Ok(Evaluated::Empty);
        }
        match source {
            "nothing" => Ok(Evaluated::Nothing),
            "read" => match self.stdin.read_line() {
                Ok(line) => Ok(Evaluated::Value(line.unwrap_or_default())),
                Err(e) => Err(EvalError::runtime(e.to_string())),
            },
            "swap-panel" => {
                if let Some(panel) = &self.panel {
                    panel.replace();
                }
                Ok(Evaluated::Value("swapped".to_string()))
            }
            "get" => Ok(match &self.value {
                Some(value) => Evaluated::Value(value.clone()),
                None => Evaluated::Nothing,
            }),
            other => Ok(Evaluated::Value(other.to_string())),
        }
    }

    fn members(&mut self, path: &[String]) -> Result<Vec<String>, EvalError> {
        let names: &[&str] = match path {
            [] => &["print", "pairs", "panel", "_hidden"],
            [table] if table == "math" => &["floor", "huge", "pi"],
            [table] if table == "bad" => return Err(EvalError::runtime("no such table")),
            [table] if table == "crash" => panic!("completion bug"),
            _ => &[],
        };
        Ok(names.iter().map(|s| s.to_string()).collect())
    }

    fn banner(&self) -> String {
        "Recording interpreter\nfor tests".to_string()
    }
}

/// Factory for [`Recording`] interpreters; counts sessions created.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    pub log: Rc<RefCell<Vec<String>>>,
    pub created: Rc<Cell<usize>>,
    pub panel: Option<PanelHandle>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_panel(panel: PanelHandle) -> Self {
        Self {
            panel: Some(panel),
            ..Self::default()
        }
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl InterpreterFactory for RecordingFactory {
    fn create(&self, seed: SessionSeed) -> Result<Box<dyn Interpreter>, EvalError> {
        self.created.set(self.created.get() + 1);
        Ok(Box::new(Recording {
            log: self.log.clone(),
            capture: seed.capture,
            stdin: seed.stdin,
            panel: self.panel.clone(),
            value: None,
        }))
    }
}

/// Type `line` into the host's current line.
pub fn type_line(host: &mut MemoryHost, line: &str) {
    host.set_input(line);
}

pub fn entries_of(host: &MemoryHost, kind: LineKind) -> Vec<String> {
    host.scrollback()
        .into_iter()
        .filter(|l| l.kind == kind)
        .map(|l| l.text)
        .collect()
}

pub fn last_entries(host: &MemoryHost, since: usize) -> Vec<ScrollbackLine> {
    host.scrollback_since(since).to_vec()
}
