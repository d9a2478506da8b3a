//! Token oracle boundary and model defaults.
//!
//! Token counting is an external concern: the real tokenizer lives with the
//! provider adapter. The core only needs a [`TokenCounter`] it can consult.
//! [`CharEstimator`] is the conservative fallback used when no model config
//! is available — a missing model must never be a hard crash.

use crate::message::Message;

/// Approximate characters per token for the fallback estimator.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Conservative context window used when the model config is missing.
pub const FALLBACK_CONTEXT_TOKENS: u64 = 128_000;

// ─────────────────────────────────────────────────────────────────────────────
// TokenCounter
// ─────────────────────────────────────────────────────────────────────────────

/// External token-counting oracle.
///
/// Implementations are assumed fast and local; anything that needs the
/// network must offload itself.
pub trait TokenCounter {
    /// Count tokens in a text fragment.
    fn count_text(&self, text: &str) -> u64;

    /// Count tokens across a message sequence.
    ///
    /// The default sums per-message content counts.
    fn count_messages(&self, messages: &[Message]) -> u64 {
        messages.iter().map(|m| self.count_text(&m.content)).sum()
    }
}

/// Character-ratio token estimator.
///
/// Deliberately conservative (overestimates for symbol-dense content) so
/// budget checks err toward compacting early rather than overflowing.
#[derive(Clone, Copy, Debug)]
pub struct CharEstimator {
    chars_per_token: u64,
}

impl CharEstimator {
    /// Create an estimator with an explicit character ratio.
    #[must_use]
    pub fn new(chars_per_token: u64) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharEstimator {
    fn default() -> Self {
        Self::new(CHARS_PER_TOKEN)
    }
}

impl TokenCounter for CharEstimator {
    fn count_text(&self, text: &str) -> u64 {
        (text.len() as u64).div_ceil(self.chars_per_token)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Model limits
// ─────────────────────────────────────────────────────────────────────────────

/// The slice of model configuration the persistence core consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelLimits {
    /// Context window size in tokens.
    pub context: u64,
    /// Provider identifier (`anthropic`, `openai`, ...).
    pub provider: String,
    /// Model name.
    pub name: String,
}

impl ModelLimits {
    /// Conservative defaults for when no model config is available.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            context: FALLBACK_CONTEXT_TOKENS,
            provider: "unknown".into(),
            name: "unknown".into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_estimator_rounds_up() {
        let counter = CharEstimator::new(4);
        assert_eq!(counter.count_text(""), 0);
        assert_eq!(counter.count_text("abc"), 1);
        assert_eq!(counter.count_text("abcde"), 2);
    }

    #[test]
    fn char_estimator_rejects_zero_ratio() {
        let counter = CharEstimator::new(0);
        assert_eq!(counter.count_text("abcd"), 4);
    }

    #[test]
    fn count_messages_sums_contents() {
        let counter = CharEstimator::new(1);
        let messages = vec![Message::user("ab"), Message::assistant("cde")];
        assert_eq!(counter.count_messages(&messages), 5);
    }

    #[test]
    fn fallback_limits_are_conservative() {
        let limits = ModelLimits::fallback();
        assert_eq!(limits.context, FALLBACK_CONTEXT_TOKENS);
        assert_eq!(limits.provider, "unknown");
    }
}
