//! Fenced-codeblock and `<details>` block location.
//!
//! Byte-range locators used by the summarizer (to lift code out of
//! scoring) and by the fallback reducer (to truncate inside blocks).
//! Nested `<details>` are matched with a depth counter over a
//! position-sorted merge of open/close tags — not regex balancing.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static DETAILS_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<details(\s[^>]*)?>").expect("valid regex"));

static DETAILS_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</details>").expect("valid regex"));

/// Byte ranges of fenced code blocks, fences included.
///
/// A fence is a line whose trimmed content starts with three backticks.
/// An unclosed trailing fence extends to the end of the text.
#[must_use]
pub fn fenced_block_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open_at: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            match open_at.take() {
                None => open_at = Some(offset),
                Some(start) => ranges.push(start..offset + line.len()),
            }
        }
        offset += line.len();
    }
    if let Some(start) = open_at {
        ranges.push(start..text.len());
    }
    ranges
}

/// Byte ranges of top-level `<details>…</details>` blocks.
///
/// Open and close tags are merged into one position-sorted stream and
/// walked with a depth counter, so nesting is handled exactly. Unclosed
/// blocks are dropped.
#[must_use]
pub fn details_block_ranges(text: &str) -> Vec<Range<usize>> {
    #[derive(Clone, Copy)]
    enum Tag {
        Open(usize),
        Close(usize, usize),
    }

    let mut tags: Vec<(usize, Tag)> = DETAILS_OPEN
        .find_iter(text)
        .map(|m| (m.start(), Tag::Open(m.start())))
        .chain(
            DETAILS_CLOSE
                .find_iter(text)
                .map(|m| (m.start(), Tag::Close(m.start(), m.end()))),
        )
        .collect();
    tags.sort_by_key(|(pos, _)| *pos);

    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut top_start = 0usize;

    for (_, tag) in tags {
        match tag {
            Tag::Open(start) => {
                if depth == 0 {
                    top_start = start;
                }
                depth += 1;
            }
            Tag::Close(_, end) => {
                if depth == 0 {
                    continue; // stray close tag
                }
                depth -= 1;
                if depth == 0 {
                    ranges.push(top_start..end);
                }
            }
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_single_fenced_block() {
        let text = "before\n```rust\nlet x = 1;\n```\nafter";
        let ranges = fenced_block_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(&text[ranges[0].clone()], "```rust\nlet x = 1;\n```\n");
    }

    #[test]
    fn locates_multiple_blocks() {
        let text = "```\na\n```\ntext\n```\nb\n```";
        assert_eq!(fenced_block_ranges(text).len(), 2);
    }

    #[test]
    fn unclosed_fence_extends_to_end() {
        let text = "x\n```\nunfinished";
        let ranges = fenced_block_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end, text.len());
    }

    #[test]
    fn no_blocks_in_plain_text() {
        assert!(fenced_block_ranges("just words").is_empty());
        assert!(details_block_ranges("just words").is_empty());
    }

    #[test]
    fn locates_details_block_with_attributes() {
        let text = "a <details open><summary>t</summary>body</details> b";
        let ranges = details_block_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert!(text[ranges[0].clone()].starts_with("<details open>"));
        assert!(text[ranges[0].clone()].ends_with("</details>"));
    }

    #[test]
    fn nested_details_resolve_to_outermost() {
        let text = "<details><summary>o</summary><details>inner</details>tail</details>";
        let ranges = details_block_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].clone(), 0..text.len());
    }

    #[test]
    fn sibling_details_are_separate() {
        let text = "<details>a</details> mid <details>b</details>";
        assert_eq!(details_block_ranges(text).len(), 2);
    }

    #[test]
    fn stray_close_tag_is_ignored() {
        let text = "</details><details>ok</details>";
        let ranges = details_block_ranges(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(&text[ranges[0].clone()], "<details>ok</details>");
    }

    #[test]
    fn unclosed_details_dropped() {
        assert!(details_block_ranges("<details>never closed").is_empty());
    }
}
