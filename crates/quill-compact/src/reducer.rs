//! Guaranteed-terminating fallback reduction.
//!
//! [`reduce_log`] repeatedly replaces the single longest non-pinned
//! message with a line-truncated version — first/last lines of each
//! fenced code block and each `<details>` block kept, the middle elided
//! with `[...]` — until the log fits the budget or a pass makes no
//! progress. No progress means return unchanged: this never loops.
//!
//! [`limit_log`] is the companion pass: leading system messages and
//! pinned messages are kept verbatim, then messages are kept newest-first
//! until the budget would be exceeded.

use quill_core::log::Log;
use quill_core::message::{Message, Role};
use quill_core::oracle::TokenCounter;
use tracing::{debug, warn};

use crate::blocks::{details_block_ranges, fenced_block_ranges};

/// Lines kept at each edge of a truncated block.
pub const KEEP_EDGE_LINES: usize = 5;

/// Elision marker inserted where lines were removed.
pub const ELISION: &str = "[...]";

// ─────────────────────────────────────────────────────────────────────────────
// Line truncation
// ─────────────────────────────────────────────────────────────────────────────

/// Keep the first and last `keep` lines, eliding the middle.
///
/// Returns `None` when there is nothing to elide.
fn truncate_lines(lines: &[&str], keep: usize) -> Option<String> {
    if lines.len() <= 2 * keep + 1 {
        return None;
    }
    let mut out: Vec<&str> = Vec::with_capacity(2 * keep + 1);
    out.extend_from_slice(&lines[..keep]);
    out.push(ELISION);
    out.extend_from_slice(&lines[lines.len() - keep..]);
    Some(out.join("\n"))
}

/// Truncate one block's interior, fences/tags and `<summary>` kept.
///
/// For fenced code the first and last lines are the fences themselves.
/// For `<details>` the head up to `</summary>` stays verbatim.
fn truncate_block(block: &str, keep: usize) -> Option<String> {
    let lines: Vec<&str> = block.lines().collect();
    if lines.is_empty() {
        return None;
    }

    // Head lines that must stay: opening fence or <details> header
    // including its <summary>.
    let head_end = lines
        .iter()
        .position(|l| l.contains("</summary>"))
        .map_or(1, |i| i + 1);
    if lines.len() <= head_end + 1 {
        return None;
    }

    let body = &lines[head_end..lines.len() - 1];
    let truncated_body = truncate_lines(body, keep)?;

    let mut out = lines[..head_end].join("\n");
    out.push('\n');
    out.push_str(&truncated_body);
    out.push('\n');
    out.push_str(lines[lines.len() - 1]);
    Some(out)
}

/// Produce a line-truncated version of message content.
///
/// Every fenced code block and top-level `<details>` block has its middle
/// elided. Content without any block falls back to whole-body truncation
/// so progress is still possible.
#[must_use]
pub fn truncate_content(text: &str, keep: usize) -> String {
    let mut ranges = fenced_block_ranges(text);
    let fenced_count = ranges.len();
    // Details blocks outside fenced code.
    for details in details_block_ranges(text) {
        let inside_code = ranges[..fenced_count]
            .iter()
            .any(|r| r.start <= details.start && details.end <= r.end);
        if !inside_code {
            ranges.push(details);
        }
    }
    ranges.sort_by_key(|r| r.start);

    if ranges.is_empty() {
        let lines: Vec<&str> = text.lines().collect();
        return truncate_lines(&lines, keep).unwrap_or_else(|| text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for range in ranges {
        if range.start < cursor {
            continue; // overlapping range, already handled
        }
        out.push_str(&text[cursor..range.start]);
        let block = &text[range.clone()];
        match truncate_block(block, keep) {
            Some(shorter) => out.push_str(&shorter),
            None => out.push_str(block),
        }
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// reduce_log
// ─────────────────────────────────────────────────────────────────────────────

/// Reduce a log under `limit` tokens by truncating its longest messages.
///
/// Pinned messages are never touched. Stops as soon as a truncation makes
/// no progress, keeping whatever earlier iterations already shrank;
/// termination is guaranteed because every iteration either strictly
/// shrinks the total or stops.
#[must_use]
pub fn reduce_log(log: &Log, limit: u64, counter: &dyn TokenCounter) -> Log {
    let mut messages: Vec<Message> = log.messages().to_vec();

    loop {
        let total: u64 = counter.count_messages(&messages);
        if total <= limit {
            break;
        }

        let longest = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.pinned)
            .max_by_key(|(_, m)| counter.count_text(&m.content));
        let Some((idx, msg)) = longest else {
            break; // everything pinned
        };

        let before = counter.count_text(&msg.content);
        let truncated = truncate_content(&msg.content, KEEP_EDGE_LINES);
        let after = counter.count_text(&truncated);
        if after >= before {
            warn!(total, limit, "fallback reduction made no progress, stopping");
            break;
        }

        debug!(index = idx, before, after, "truncated longest message");
        messages[idx] = msg.with_content(truncated);
    }

    Log::from_messages(messages)
}

// ─────────────────────────────────────────────────────────────────────────────
// limit_log
// ─────────────────────────────────────────────────────────────────────────────

/// Keep leading system messages verbatim, then newest-first within budget.
///
/// Pinned messages are always kept and charged against the budget first.
/// The oldest non-pinned message that would overflow the budget is
/// dropped, along with everything older.
#[must_use]
pub fn limit_log(log: &Log, limit: u64, counter: &dyn TokenCounter) -> Log {
    let messages = log.messages();
    let lead = messages
        .iter()
        .take_while(|m| m.role == Role::System)
        .count();

    let mut used: u64 = messages[..lead]
        .iter()
        .map(|m| counter.count_text(&m.content))
        .sum();
    for msg in &messages[lead..] {
        if msg.pinned {
            used += counter.count_text(&msg.content);
        }
    }

    // Walk the tail newest-first, marking keepers.
    let mut keep = vec![false; messages.len()];
    for flag in &mut keep[..lead] {
        *flag = true;
    }
    for (i, msg) in messages.iter().enumerate().skip(lead) {
        if msg.pinned {
            keep[i] = true;
        }
    }
    for i in (lead..messages.len()).rev() {
        if keep[i] {
            continue;
        }
        let tokens = counter.count_text(&messages[i].content);
        if used + tokens > limit {
            break;
        }
        keep[i] = true;
        used += tokens;
    }

    Log::from_messages(
        messages
            .iter()
            .enumerate()
            .filter(|(i, _)| keep[*i])
            .map(|(_, m)| m.clone())
            .collect(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
