//! Compaction thresholds and knobs.

use std::time::Duration;

/// Tunable thresholds for the compaction engine.
///
/// Ratios are against the model's context window unless noted.
#[derive(Clone, Debug)]
pub struct CompactionSettings {
    /// Usage ratio at which compaction fires unconditionally.
    pub trigger_ratio: f64,
    /// Fraction of the trigger limit at which compaction fires early
    /// when an oversized system message exists.
    pub proximity_ratio: f64,
    /// Phase-2 stop target as a ratio of the context window.
    pub target_ratio: f64,
    /// Minimum estimated savings (ratio of total tokens) worth the
    /// prompt-cache invalidation of an edit.
    pub min_savings_ratio: f64,
    /// A system message above this many tokens counts as oversized.
    pub oversized_tool_tokens: u64,
    /// Assumed size of a system message after replacement by a summary.
    pub replaced_tool_tokens: u64,
    /// Messages this close to the end keep their reasoning spans.
    pub reasoning_age: usize,
    /// Assumed token loss ratio from stripping reasoning.
    pub reasoning_savings_ratio: f64,
    /// Assistant messages this close to the end are never compressed.
    pub assistant_age: usize,
    /// Assistant messages below this many tokens are never compressed.
    pub assistant_min_tokens: u64,
    /// Extractive compression target ratio for assistant turns.
    pub compress_target: f64,
    /// Cooperative minimum interval between compaction attempts.
    pub min_interval: Duration,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            trigger_ratio: 0.90,
            proximity_ratio: 0.80,
            target_ratio: 0.80,
            min_savings_ratio: 0.10,
            oversized_tool_tokens: 2_000,
            replaced_tool_tokens: 200,
            reasoning_age: 5,
            reasoning_savings_ratio: 0.30,
            assistant_age: 3,
            assistant_min_tokens: 1_000,
            compress_target: 0.7,
            min_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_ordered() {
        let s = CompactionSettings::default();
        assert!(s.target_ratio < s.trigger_ratio);
        assert!(s.proximity_ratio < 1.0);
        assert!(s.min_savings_ratio > 0.0);
        assert!(s.replaced_tool_tokens < s.oversized_tool_tokens);
    }
}
