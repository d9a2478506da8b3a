//! Extractive summarization of long assistant turns.
//!
//! Fenced code blocks are lifted out to placeholders before anything is
//! scored, so code is never dropped. The remaining text is split into
//! sentences, each sentence scored by additive phrase/positional/length
//! heuristics, and the highest scorers are kept greedily until the target
//! ratio budget is spent. Output preserves original sentence order.

use std::sync::LazyLock;

use regex::Regex;

use crate::blocks::fenced_block_ranges;

/// Delimiter for code placeholders — private-use codepoint so real prose
/// can't collide with it.
const PLACEHOLDER_MARK: char = '\u{F8F0}';

// ─────────────────────────────────────────────────────────────────────────────
// Pattern tables
// ─────────────────────────────────────────────────────────────────────────────

static DECISION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(we'll use|we will use|decided to|decision is|the solution is|the approach is|going with|settled on|opted for)",
    )
    .expect("valid regex")
});

static CONCLUSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(therefore|in summary|in conclusion|the result is|this means|to summarize|overall,)",
    )
    .expect("valid regex")
});

static COMMITMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bi'll\b|\bi will\b|\bnext steps?:|\btodo:|\bwe need to\b|\bremaining work\b)")
        .expect("valid regex")
});

static COMPLETED_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(created file|created|fixed|implemented|added|updated|removed|renamed|wrote|refactored|deleted)\b",
    )
    .expect("valid regex")
});

static FILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[\w~.-]+)?(?:/[\w.-]+)+|\b[\w-]+\.(?:rs|py|ts|js|tsx|go|java|c|h|cpp|toml|json|yaml|yml|md|txt|sh|lock)\b")
        .expect("valid regex")
});

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

static ERROR_INDICATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(error|exception|failed|failure|panic|traceback|fatal)\b")
        .expect("valid regex")
});

// ─────────────────────────────────────────────────────────────────────────────
// Scoring
// ─────────────────────────────────────────────────────────────────────────────

/// Score one sentence. Each category contributes at most once even when a
/// sentence matches it several times.
fn score_sentence(sentence: &str, index: usize, last_index: usize) -> f64 {
    let mut score = 0.0;

    if DECISION.is_match(sentence) {
        score += 2.0;
    }
    // Conclusion and commitment share a single +1.5 slot.
    if CONCLUSION.is_match(sentence) || COMMITMENT.is_match(sentence) {
        score += 1.5;
    }
    if COMPLETED_ACTION.is_match(sentence) {
        score += 1.0;
    }
    if FILE_PATH.is_match(sentence) {
        score += 1.0;
    }
    if URL.is_match(sentence) {
        score += 0.5;
    }
    if ERROR_INDICATOR.is_match(sentence) {
        score += 1.5;
    }

    // Positional bonus.
    if index == 0 {
        score += 2.0;
    } else if index == last_index {
        score += 1.5;
    } else if index < 3 {
        score += 1.0;
    }

    // Length shaping.
    let len = sentence.len();
    if len < 10 {
        score -= 1.0;
    } else if len <= 50 {
        score += 0.3;
    } else if len > 200 {
        score -= 0.2;
    }

    score
}

/// Split text into sentences on `.`/`!`/`?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let boundary = chars.peek().is_none_or(|next| next.is_whitespace());
            if boundary {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
                // Swallow the whitespace run.
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    let _ = chars.next();
                }
            }
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

// ─────────────────────────────────────────────────────────────────────────────
// Summarization
// ─────────────────────────────────────────────────────────────────────────────

/// Compress `text` toward `target_ratio` of its prose length.
///
/// Fenced code blocks and the sentences carrying their placeholders are
/// kept unconditionally; the ratio budget applies to the prose that
/// remains. Output keeps original sentence order.
#[must_use]
pub fn extractive_summarize(text: &str, target_ratio: f64) -> String {
    // Lift code out before scoring.
    let blocks = fenced_block_ranges(text);
    let mut lifted = String::with_capacity(text.len());
    let mut code: Vec<&str> = Vec::with_capacity(blocks.len());
    let mut cursor = 0;
    for range in &blocks {
        lifted.push_str(&text[cursor..range.start]);
        lifted.push_str(&format!(
            "{PLACEHOLDER_MARK}{}{PLACEHOLDER_MARK}",
            code.len()
        ));
        code.push(&text[range.clone()]);
        cursor = range.end;
    }
    lifted.push_str(&text[cursor..]);

    let sentences = split_sentences(&lifted);
    if sentences.is_empty() {
        return text.to_string();
    }
    let last_index = sentences.len() - 1;

    let has_placeholder =
        |s: &str| s.chars().any(|c| c == PLACEHOLDER_MARK);

    // Budget applies to prose only: total length minus always-kept
    // placeholder sentences.
    let prose_len: usize = sentences
        .iter()
        .filter(|s| !has_placeholder(s))
        .map(String::len)
        .sum();
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let budget = (prose_len as f64 * target_ratio.clamp(0.0, 1.0)) as usize;

    // Greedy selection by score, highest first.
    let mut order: Vec<usize> = (0..sentences.len())
        .filter(|&i| !has_placeholder(&sentences[i]))
        .collect();
    let scores: Vec<f64> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| score_sentence(s, i, last_index))
        .collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut keep = vec![false; sentences.len()];
    let mut used = 0usize;
    for i in (0..sentences.len()).filter(|&i| has_placeholder(&sentences[i])) {
        keep[i] = true;
    }
    // Selection stops at the first sentence that would overflow the
    // budget; lower-scored sentences past it are not backfilled.
    for &i in &order {
        let len = sentences[i].len();
        if used + len > budget {
            break;
        }
        keep[i] = true;
        used += len;
    }

    // Reassemble in original order, then put the code back.
    let kept: Vec<&str> = sentences
        .iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(_, s)| s.as_str())
        .collect();
    let mut out = kept.join(" ");
    for (i, block) in code.iter().enumerate() {
        out = out.replace(
            &format!("{PLACEHOLDER_MARK}{i}{PLACEHOLDER_MARK}"),
            block,
        );
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
