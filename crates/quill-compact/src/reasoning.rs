//! Reasoning-span stripping.
//!
//! Removes paired `<think>…</think>` / `<thinking>…</thinking>` spans
//! (including embedded newlines) and collapses the multi-blank-line runs
//! left behind. Unpaired tags are left alone.

use std::sync::LazyLock;

use regex::Regex;

static REASONING_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?</think>|<thinking>.*?</thinking>").expect("valid regex")
});

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Strip paired reasoning spans from `text`.
///
/// Returns `None` when nothing matched.
#[must_use]
pub fn strip_reasoning(text: &str) -> Option<String> {
    if !REASONING_SPAN.is_match(text) {
        return None;
    }
    let stripped = REASONING_SPAN.replace_all(text, "");
    let collapsed = BLANK_RUN.replace_all(&stripped, "\n\n");
    Some(collapsed.into_owned())
}

/// Returns `true` if `text` carries at least one paired reasoning span.
#[must_use]
pub fn has_reasoning(text: &str) -> bool {
    REASONING_SPAN.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_span() {
        let text = "before <think>secret plan</think> after";
        assert_eq!(strip_reasoning(text).unwrap(), "before  after");
    }

    #[test]
    fn strips_thinking_span_with_newlines() {
        let text = "a\n<thinking>\nline one\nline two\n</thinking>\nb";
        assert_eq!(strip_reasoning(text).unwrap(), "a\n\nb");
    }

    #[test]
    fn collapses_blank_runs_left_behind() {
        let text = "a\n\n<think>x</think>\n\nb";
        let out = strip_reasoning(text).unwrap();
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn unpaired_open_tag_is_untouched() {
        assert_eq!(strip_reasoning("before <think> after"), None);
    }

    #[test]
    fn case_insensitive() {
        assert!(has_reasoning("x <THINK>y</THINK> z"));
    }

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(strip_reasoning("no tags here"), None);
        assert!(!has_reasoning("no tags here"));
    }
}
