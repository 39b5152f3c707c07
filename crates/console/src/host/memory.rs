//! In-memory console panel.
//!
//! Holds the same state a real host panel does (line history, scrollback,
//! prompt, selection, clipboard) without any UI. The terminal front-end
//! renders from it and the tests inspect it directly.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{
    ConsoleHost, ConsoleId, GenerationToken, HistoryLine, HostHandle, HostObject, HostValue,
    LineKind, PanelId, ScrollbackLine,
};

/// A host object backed by a fixed attribute map.
#[derive(Debug, Clone)]
pub struct StaticObject {
    type_name: String,
    attributes: BTreeMap<String, HostValue>,
}

impl StaticObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: HostValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn into_handle(self) -> HostHandle {
        Rc::new(self)
    }
}

impl HostObject for StaticObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn attribute(&self, name: &str) -> Option<HostValue> {
        self.attributes.get(name).cloned()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }
}

/// Shared handle on a panel's identity.
///
/// Lets something outside the `&mut` borrow of the host (a host object, a
/// test interpreter) simulate the panel being swapped out mid-evaluation.
#[derive(Debug, Clone)]
pub struct PanelHandle(Rc<Cell<u64>>);

impl PanelHandle {
    /// Replace the panel with a new one.
    pub fn replace(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn id(&self) -> PanelId {
        PanelId(self.0.get())
    }
}

/// State for an in-memory console panel
#[derive(Debug)]
pub struct MemoryHost {
    console_id: ConsoleId,

    panel: PanelHandle,

    /// Bumped by `load_document()`
    generation: u64,

    /// Line history; the last entry is the line being edited
    history: Vec<HistoryLine>,

    /// Scrollback log (inputs, outputs, errors, info)
    scrollback: Vec<ScrollbackLine>,

    prompt: String,

    /// Selection range in the current line (byte offsets)
    pub select_start: isize,
    pub select_end: isize,

    /// Last text written to the clipboard
    clipboard: Option<String>,

    /// Number of redraw requests received
    redraws: usize,

    context: HostHandle,
    document: HostHandle,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::with_console_id(ConsoleId::of("memory"))
    }

    pub fn with_console_id(console_id: ConsoleId) -> Self {
        let context = StaticObject::new("Context")
            .with("area", HostValue::String("CONSOLE".to_string()))
            .with("mode", HostValue::String("OBJECT".to_string()))
            .into_handle();
        Self {
            console_id,
            panel: PanelHandle(Rc::new(Cell::new(1))),
            generation: 1,
            history: vec![HistoryLine::default()],
            scrollback: Vec::new(),
            prompt: String::new(),
            select_start: 0,
            select_end: 0,
            clipboard: None,
            redraws: 0,
            context,
            document: Self::untitled_document(),
        }
    }

    fn untitled_document() -> HostHandle {
        StaticObject::new("Document")
            .with("name", HostValue::String("untitled".to_string()))
            .with("objects", HostValue::Integer(0))
            .into_handle()
    }

    /// Replace the document singleton and bump the generation token.
    pub fn load_document(&mut self, document: HostHandle) {
        self.document = document;
        self.generation += 1;
    }

    /// Replace the document with an empty one (new generation).
    pub fn reload(&mut self) {
        self.load_document(Self::untitled_document());
    }

    /// Set the text of the line being edited, cursor at the end.
    pub fn set_input(&mut self, text: &str) {
        self.set_current_line(text, text.len());
    }

    /// Move the cursor of the line being edited.
    pub fn set_cursor(&mut self, cursor: usize) {
        if let Some(line) = self.history.last_mut() {
            line.cursor = cursor.min(line.body.len());
        }
    }

    /// Forget every history line, including the one being edited.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &[HistoryLine] {
        &self.history
    }

    /// Scrollback entries from `start` on (for incremental rendering).
    pub fn scrollback_since(&self, start: usize) -> &[ScrollbackLine] {
        &self.scrollback[start.min(self.scrollback.len())..]
    }

    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    pub fn clipboard(&self) -> Option<&str> {
        self.clipboard.as_deref()
    }

    pub fn redraws(&self) -> usize {
        self.redraws
    }

    pub fn panel_handle(&self) -> PanelHandle {
        self.panel.clone()
    }
}

impl ConsoleHost for MemoryHost {
    fn console_id(&self) -> ConsoleId {
        self.console_id
    }

    fn panel_id(&self) -> PanelId {
        self.panel.id()
    }

    fn generation(&self) -> GenerationToken {
        GenerationToken(self.generation)
    }

    fn current_line(&self) -> Option<HistoryLine> {
        self.history.last().cloned()
    }

    fn set_current_line(&mut self, body: &str, cursor: usize) {
        match self.history.last_mut() {
            Some(line) => {
                line.body = body.to_string();
                line.cursor = cursor.min(body.len());
            }
            None => self.history.push(HistoryLine {
                body: body.to_string(),
                cursor: cursor.min(body.len()),
            }),
        }
    }

    fn prompt(&self) -> String {
        self.prompt.clone()
    }

    fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
    }

    fn append_scrollback_line(&mut self, text: &str, kind: LineKind) {
        self.scrollback.push(ScrollbackLine::new(kind, text));
    }

    fn scrollback(&self) -> Vec<ScrollbackLine> {
        self.scrollback.clone()
    }

    fn append_history(&mut self, body: &str, cursor: usize, remove_duplicates: bool) {
        if remove_duplicates {
            // Never drop the line just submitted (the last entry)
            let keep_last = self.history.len().saturating_sub(1);
            let mut index = 0;
            self.history.retain(|line| {
                let keep = index >= keep_last || line.body != body;
                index += 1;
                keep
            });
        }
        self.history.push(HistoryLine {
            body: body.to_string(),
            cursor: cursor.min(body.len()),
        });
    }

    fn shift_selection(&mut self, offset: isize) {
        self.select_start += offset;
        self.select_end += offset;
    }

    fn request_redraw(&mut self) {
        self.redraws += 1;
    }

    fn set_clipboard(&mut self, text: String) {
        self.clipboard = Some(text);
    }

    fn context(&self) -> Option<HostHandle> {
        Some(self.context.clone())
    }

    fn document(&self) -> Option<HostHandle> {
        Some(self.document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_one_blank_line() {
        let host = MemoryHost::new();
        assert_eq!(host.current_line(), Some(HistoryLine::default()));
    }

    #[test]
    fn test_set_input_moves_cursor_to_end() {
        let mut host = MemoryHost::new();
        host.set_input("x = 1");
        let line = host.current_line().unwrap();
        assert_eq!(line.body, "x = 1");
        assert_eq!(line.cursor, 5);
    }

    #[test]
    fn test_append_history_removes_duplicates() {
        let mut host = MemoryHost::new();
        host.set_input("");
        host.append_history("", 0, true);
        host.set_input("print(1)");
        host.append_history("", 0, true);

        // Older blank lines are dropped; the submitted line and the new blank remain
        let bodies: Vec<_> = host.history().iter().map(|l| l.body.as_str()).collect();
        assert_eq!(bodies, vec!["print(1)", ""]);
    }

    #[test]
    fn test_load_document_bumps_generation() {
        let mut host = MemoryHost::new();
        let before = host.generation();
        host.reload();
        assert_ne!(host.generation(), before);
    }

    #[test]
    fn test_panel_handle_replace() {
        let host = MemoryHost::new();
        let before = host.panel_id();
        host.panel_handle().replace();
        assert_ne!(host.panel_id(), before);
    }

    #[test]
    fn test_static_object_attributes() {
        let obj = StaticObject::new("Thing")
            .with("b", HostValue::Bool(true))
            .with("a", HostValue::Integer(3));
        assert_eq!(obj.type_name(), "Thing");
        assert_eq!(obj.attribute_names(), vec!["a", "b"]);
        assert!(matches!(obj.attribute("a"), Some(HostValue::Integer(3))));
        assert!(obj.attribute("missing").is_none());
    }
}
