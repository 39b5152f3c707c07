//! "Copy as script": turn a console transcript back into source text.

use conbridge_config::ConsoleSettings;

use crate::host::{LineKind, ScrollbackLine};

/// Render scrollback as a script.
///
/// INFO lines are dropped. INPUT lines lose their prompt. OUTPUT and ERROR
/// lines become comments with distinct markers so the result still runs.
pub fn copy_as_script(scrollback: &[ScrollbackLine], settings: &ConsoleSettings) -> String {
    let mut lines = Vec::with_capacity(scrollback.len());
    for entry in scrollback {
        let text = match entry.kind {
            LineKind::Info => continue,
            LineKind::Input => strip_prompt(&entry.text, settings).to_string(),
            LineKind::Output => format!("{}{}", settings.output_marker, entry.text),
            LineKind::Error => format!("{}{}", settings.error_marker, entry.text),
        };
        lines.push(text);
    }
    lines.join("\n")
}

fn strip_prompt<'a>(text: &'a str, settings: &ConsoleSettings) -> &'a str {
    text.strip_prefix(settings.prompt_primary.as_str())
        .or_else(|| text.strip_prefix(settings.prompt_continuation.as_str()))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sample_transcript() {
        let settings = ConsoleSettings::default();
        let scrollback = vec![
            ScrollbackLine::input(format!("{}x=1", settings.prompt_primary)),
            ScrollbackLine::output("2"),
            ScrollbackLine::error("boom"),
            ScrollbackLine::info("suggestion"),
        ];
        assert_eq!(copy_as_script(&scrollback, &settings), "x=1\n#~ 2\n#! boom");
    }

    #[test]
    fn test_continuation_prompt_stripped() {
        let settings = ConsoleSettings::default();
        let scrollback = vec![
            ScrollbackLine::input("lua> function f()"),
            ScrollbackLine::input("...  return 1 end"),
            ScrollbackLine::input("no prompt here"),
        ];
        assert_eq!(
            copy_as_script(&scrollback, &settings),
            "function f()\nreturn 1 end\nno prompt here"
        );
    }

    #[test]
    fn test_custom_markers() {
        let settings = ConsoleSettings {
            output_marker: "-- ".to_string(),
            error_marker: "--! ".to_string(),
            ..ConsoleSettings::default()
        };
        let scrollback = vec![ScrollbackLine::output("1"), ScrollbackLine::error("e")];
        assert_eq!(copy_as_script(&scrollback, &settings), "-- 1\n--! e");
    }

    #[test]
    fn test_empty_scrollback() {
        assert_eq!(copy_as_script(&[], &ConsoleSettings::default()), "");
    }

    fn line_kind() -> impl Strategy<Value = LineKind> {
        prop_oneof![
            Just(LineKind::Input),
            Just(LineKind::Output),
            Just(LineKind::Error),
            Just(LineKind::Info),
        ]
    }

    proptest! {
        #[test]
        fn prop_one_script_line_per_non_info_entry(
            entries in prop::collection::vec((line_kind(), "[a-z0-9 =]{0,12}"), 0..20)
        ) {
            let settings = ConsoleSettings::default();
            let scrollback: Vec<_> = entries
                .iter()
                .map(|(kind, text)| ScrollbackLine::new(*kind, text.clone()))
                .collect();
            let script = copy_as_script(&scrollback, &settings);

            let kept: Vec<_> = scrollback.iter().filter(|l| l.kind != LineKind::Info).collect();
            let script_lines: Vec<&str> = if kept.is_empty() {
                Vec::new()
            } else {
                script.split('\n').collect()
            };
            prop_assert_eq!(script_lines.len(), kept.len());

            for (line, entry) in script_lines.iter().zip(kept) {
                match entry.kind {
                    LineKind::Output => { prop_assert!(line.starts_with("#~ ")); }
                    LineKind::Error => { prop_assert!(line.starts_with("#! ")); }
                    _ => { prop_assert_eq!(*line, entry.text.as_str()); }
                }
            }
        }
    }
}
