//! Name completion against a session's namespace.

use crate::error::CompletionError;
use crate::interpreter::Interpreter;

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Result of expanding the line at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub line: String,
    pub cursor: usize,
    /// Candidate listing, one per line. Empty when there is nothing to show.
    pub suggestions: String,
}

impl Expansion {
    /// The line left as it was.
    pub fn unchanged(line: &str, cursor: usize) -> Self {
        Self {
            line: line.to_string(),
            cursor,
            suggestions: String::new(),
        }
    }
}

/// Expands the word before the cursor.
pub trait CompletionEngine {
    /// `private` allows names starting with `_`.
    fn expand(
        &self,
        line: &str,
        cursor: usize,
        namespace: &mut dyn Interpreter,
        private: bool,
    ) -> Result<Expansion, CompletionError>;
}

/// Completes dotted names (`string.up`, `D.na`, `s:up`) from the namespace.
///
/// One match replaces the word. Several matches extend it to their common
/// prefix and are listed as suggestions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameCompleter;

impl CompletionEngine for NameCompleter {
    fn expand(
        &self,
        line: &str,
        cursor: usize,
        namespace: &mut dyn Interpreter,
        private: bool,
    ) -> Result<Expansion, CompletionError> {
        if cursor > line.len() || !line.is_char_boundary(cursor) {
            return Err(CompletionError::BadCursor {
                cursor,
                len: line.len(),
            });
        }

        let word_start = line[..cursor]
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_name_char(*c) || *c == '.' || *c == ':')
            .last()
            .map(|(i, _)| i)
            .unwrap_or(cursor);
        let word = &line[word_start..cursor];

        let (path, partial) = match word.rfind(['.', ':']) {
            Some(idx) => (&word[..idx], &word[idx + 1..]),
            None => ("", word),
        };

        let segments: Vec<String> = if path.is_empty() {
            Vec::new()
        } else {
            path.split(['.', ':']).map(str::to_string).collect()
        };
        // "a..b", ".x", "1.5" and friends are not name paths
        if segments
            .iter()
            .any(|s| s.is_empty() || s.starts_with(|c: char| c.is_ascii_digit()))
        {
            return Ok(Expansion::unchanged(line, cursor));
        }

        let mut names = namespace
            .members(&segments)
            .map_err(CompletionError::Namespace)?;
        if segments.is_empty() {
            names.extend(LUA_KEYWORDS.iter().map(|k| k.to_string()));
        }

        let show_private = private || partial.starts_with('_');
        let mut matches: Vec<String> = names
            .into_iter()
            .filter(|name| name.starts_with(partial))
            .filter(|name| show_private || !name.starts_with('_'))
            .collect();
        matches.sort();
        matches.dedup();

        let replacement = match matches.as_slice() {
            [] => return Ok(Expansion::unchanged(line, cursor)),
            [only] => only.clone(),
            several => common_prefix(several),
        };

        let partial_start = cursor - partial.len();
        let mut new_line = String::with_capacity(line.len() + replacement.len());
        new_line.push_str(&line[..partial_start]);
        new_line.push_str(&replacement);
        new_line.push_str(&line[cursor..]);

        let suggestions = if matches.len() > 1 {
            matches.join("\n")
        } else {
            String::new()
        };

        Ok(Expansion {
            line: new_line,
            cursor: partial_start + replacement.len(),
            suggestions,
        })
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn common_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut len = first.len();
    for name in &names[1..] {
        len = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0)
            .min(len);
    }
    first[..len].to_string()
}
