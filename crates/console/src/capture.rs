//! Captured standard output and standard error of a session.

use std::cell::RefCell;
use std::rc::Rc;

/// Line-capped text buffer.
///
/// Text is accepted until `max_lines` newlines have been written; after
/// that, writes are dropped and a single truncation notice is reported by
/// [`OutputSink::contents`].
#[derive(Debug)]
pub struct OutputSink {
    text: String,
    lines: usize,
    max_lines: usize,
    truncated: bool,
}

impl OutputSink {
    pub fn new(max_lines: usize) -> Self {
        Self {
            text: String::new(),
            lines: 0,
            max_lines,
            truncated: false,
        }
    }

    pub fn write(&mut self, text: &str) {
        if self.truncated {
            return;
        }
        for piece in text.split_inclusive('\n') {
            if self.lines >= self.max_lines {
                self.truncated = true;
                return;
            }
            self.text.push_str(piece);
            if piece.ends_with('\n') {
                self.lines += 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Everything written so far, plus the truncation notice if any.
    pub fn contents(&self) -> String {
        let mut out = self.text.clone();
        if self.truncated {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!(
                "... output truncated ({} line limit)\n",
                self.max_lines
            ));
        }
        out
    }
}

/// Text captured during one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
struct Sinks {
    stdout: OutputSink,
    stderr: OutputSink,
}

impl Sinks {
    fn new(max_lines: usize) -> Self {
        Self {
            stdout: OutputSink::new(max_lines),
            stderr: OutputSink::new(max_lines),
        }
    }
}

/// Shared stdout/stderr sink pair.
///
/// Clones share the same sinks, so the interpreter's `print` and the
/// executor see the same buffers. [`Capture::renew`] swaps in fresh sinks
/// for every clone at once.
#[derive(Debug, Clone)]
pub struct Capture {
    sinks: Rc<RefCell<Sinks>>,
    max_lines: usize,
}

impl Capture {
    pub fn new(max_lines: usize) -> Self {
        Self {
            sinks: Rc::new(RefCell::new(Sinks::new(max_lines))),
            max_lines,
        }
    }

    pub fn write_stdout(&self, text: &str) {
        self.sinks.borrow_mut().stdout.write(text);
    }

    pub fn write_stderr(&self, text: &str) {
        self.sinks.borrow_mut().stderr.write(text);
    }

    /// Replace both sinks with new empty ones.
    pub fn renew(&self) {
        *self.sinks.borrow_mut() = Sinks::new(self.max_lines);
    }

    /// Captured text so far, leaving fresh sinks behind.
    pub fn take(&self) -> Captured {
        let sinks = std::mem::replace(&mut *self.sinks.borrow_mut(), Sinks::new(self.max_lines));
        Captured {
            stdout: sinks.stdout.contents(),
            stderr: sinks.stderr.contents(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let sinks = self.sinks.borrow();
        sinks.stdout.is_empty() && sinks.stderr.is_empty()
    }
}
