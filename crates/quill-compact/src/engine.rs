//! Three-phase compaction engine.
//!
//! Phase 1 strips reasoning spans from aged messages. Phase 2 archives the
//! largest oversized tool results and replaces them with a summary plus a
//! master-context byte-range pointer, largest first, until the log is back
//! under the target ratio. Phase 3 compresses aged long assistant turns
//! extractively. If the log is still over the hard limit afterwards, the
//! fallback reducer runs.
//!
//! Every edit invalidates the provider's prompt cache, so compaction is
//! gated twice: it fires only under pressure, and only when the estimated
//! savings clear a minimum ratio.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use quill_core::errors::Result;
use quill_core::log::Log;
use quill_core::message::Message;
use quill_core::oracle::{ModelLimits, TokenCounter};
use quill_store::archive::OutputArchiver;
use quill_store::master_index::MasterContextIndex;

use crate::reasoning::{has_reasoning, strip_reasoning};
use crate::reducer::reduce_log;
use crate::settings::CompactionSettings;
use crate::summarize::extractive_summarize;

/// Archive subdirectory for tool results displaced by phase 2.
const ARCHIVE_KIND: &str = "tool-result";

// ─────────────────────────────────────────────────────────────────────────────
// Estimate and report
// ─────────────────────────────────────────────────────────────────────────────

/// Predicted effect of a compaction pass, computed without editing anything.
#[derive(Clone, Copy, Debug)]
pub struct SavingsEstimate {
    /// Current total token count.
    pub total_tokens: u64,
    /// Tokens a pass is expected to recover.
    pub estimated_saved: u64,
}

impl SavingsEstimate {
    /// Estimated savings as a fraction of the current total.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total_tokens == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.estimated_saved as f64 / self.total_tokens as f64
        }
    }
}

/// What one compaction pass did.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompactionReport {
    /// Tokens before the pass.
    pub tokens_before: u64,
    /// Tokens after the pass.
    pub tokens_after: u64,
    /// Messages before the pass.
    pub messages_before: usize,
    /// Messages after the pass.
    pub messages_after: usize,
    /// Messages whose reasoning spans were stripped.
    pub reasoning_stripped: usize,
    /// Tool results archived and replaced by pointers.
    pub tool_results_archived: usize,
    /// Assistant turns compressed extractively.
    pub assistant_compressed: usize,
    /// Whether the fallback reducer had to run.
    pub fallback_applied: bool,
}

/// Compacted log plus its report.
#[derive(Clone, Debug)]
pub struct CompactionOutcome {
    /// The compacted log.
    pub log: Log,
    /// What the pass did.
    pub report: CompactionReport,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Stateful compaction driver.
///
/// Holds the settings and the last-attempt timestamp used for cooperative
/// rate limiting. One engine per conversation.
#[derive(Debug)]
pub struct CompactionEngine {
    settings: CompactionSettings,
    last_attempt: Option<Instant>,
}

impl Default for CompactionEngine {
    fn default() -> Self {
        Self::new(CompactionSettings::default())
    }
}

impl CompactionEngine {
    /// Create an engine with explicit settings.
    #[must_use]
    pub fn new(settings: CompactionSettings) -> Self {
        Self {
            settings,
            last_attempt: None,
        }
    }

    /// The settings in effect.
    #[must_use]
    pub fn settings(&self) -> &CompactionSettings {
        &self.settings
    }

    /// Returns `true` when enough time has passed since the last attempt.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.last_attempt
            .is_none_or(|at| at.elapsed() >= self.settings.min_interval)
    }

    /// Decide whether a compaction pass is worth running now.
    ///
    /// Fires when usage crosses the trigger ratio, or when usage is within
    /// the proximity ratio of it and an oversized tool result exists. Both
    /// cases are then gated on the savings estimate and the rate limit.
    #[must_use]
    pub fn should_compact(
        &self,
        log: &Log,
        counter: &dyn TokenCounter,
        limits: &ModelLimits,
    ) -> bool {
        if limits.context == 0 || !self.ready() {
            return false;
        }
        let total = log.token_count(counter);
        let hard = ratio_of(limits.context, self.settings.trigger_ratio);

        let oversized_present = log.iter().any(|m| {
            m.is_system()
                && !m.pinned
                && counter.count_text(&m.content) > self.settings.oversized_tool_tokens
        });
        let proximity = ratio_of(hard, self.settings.proximity_ratio);
        let under_pressure = total >= hard || (total >= proximity && oversized_present);
        if !under_pressure {
            return false;
        }

        let estimate = self.estimate_savings(log, counter);
        let worthwhile = estimate.ratio() >= self.settings.min_savings_ratio;
        debug!(
            total,
            hard,
            estimated_saved = estimate.estimated_saved,
            worthwhile,
            "compaction trigger check"
        );
        worthwhile
    }

    /// Estimate savings without editing the log.
    ///
    /// Sums per-phase predictions: reasoning stripping on aged messages,
    /// oversized tool results down to their replacement size, and aged long
    /// assistant turns at the compression ratio.
    ///
    /// The tool-result and assistant terms apply whether or not the log is
    /// under pressure, so the estimate is an upper bound on what a pass
    /// would actually recover. [`Self::should_compact`] consults it only
    /// after the pressure check.
    #[must_use]
    pub fn estimate_savings(&self, log: &Log, counter: &dyn TokenCounter) -> SavingsEstimate {
        let len = log.len();
        let mut saved = 0u64;

        for (idx, msg) in log.iter().enumerate() {
            if msg.pinned {
                continue;
            }
            let tokens = counter.count_text(&msg.content);
            if idx + self.settings.reasoning_age < len && has_reasoning(&msg.content) {
                saved += ratio_of(tokens, self.settings.reasoning_savings_ratio);
            }
            if msg.is_system() && tokens > self.settings.oversized_tool_tokens {
                saved += tokens - self.settings.replaced_tool_tokens;
            }
            if msg.is_assistant()
                && idx + self.settings.assistant_age < len
                && tokens > self.settings.assistant_min_tokens
            {
                saved += ratio_of(tokens, 1.0 - self.settings.compress_target);
            }
        }

        SavingsEstimate {
            total_tokens: log.token_count(counter),
            estimated_saved: saved,
        }
    }

    /// Run one full compaction pass.
    ///
    /// `master_path` is the master log backing the byte-range pointers;
    /// the index over it is rebuilt here, immediately before use. Pinned
    /// messages pass through every phase untouched.
    pub fn auto_compact(
        &mut self,
        log: &Log,
        counter: &dyn TokenCounter,
        limits: &ModelLimits,
        master_path: &Path,
        archiver: &OutputArchiver,
    ) -> Result<CompactionOutcome> {
        self.last_attempt = Some(Instant::now());

        let mut report = CompactionReport {
            tokens_before: log.token_count(counter),
            messages_before: log.len(),
            ..CompactionReport::default()
        };
        let mut messages: Vec<Message> = log.messages().to_vec();
        let len = messages.len();
        let index = MasterContextIndex::build(master_path)?;

        // Phase 1: strip reasoning from aged messages.
        for (idx, msg) in messages.iter_mut().enumerate() {
            if msg.pinned || idx + self.settings.reasoning_age >= len {
                continue;
            }
            if let Some(stripped) = strip_reasoning(&msg.content) {
                *msg = msg.with_content(stripped);
                report.reasoning_stripped += 1;
            }
        }

        // Phase 2: archive oversized tool results, largest first, until the
        // log is back under the target ratio.
        let target = ratio_of(limits.context, self.settings.target_ratio);
        let mut oversized: Vec<(usize, u64)> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_system() && !m.pinned)
            .map(|(idx, m)| (idx, counter.count_text(&m.content)))
            .filter(|(_, tokens)| *tokens > self.settings.oversized_tool_tokens)
            .collect();
        oversized.sort_by(|a, b| b.1.cmp(&a.1));

        for (idx, tokens) in oversized {
            if counter.count_messages(&messages) <= target {
                break;
            }
            let content = messages[idx].content.clone();
            let outcome = archiver.archive(ARCHIVE_KIND, &content)?;
            let mut replacement = outcome.summary;
            if let Some(range) = index.get(idx) {
                replacement.push('\n');
                replacement.push_str(&MasterContextIndex::create_reference(
                    master_path,
                    range,
                    tokens,
                    Some(&content),
                ));
            }
            messages[idx] = messages[idx].with_content(replacement);
            report.tool_results_archived += 1;
            debug!(index = idx, tokens, "archived oversized tool result");
        }

        // Phase 3: compress aged long assistant turns.
        for idx in 0..len {
            if idx + self.settings.assistant_age >= len {
                break;
            }
            let msg = &messages[idx];
            if !msg.is_assistant() || msg.pinned {
                continue;
            }
            let tokens = counter.count_text(&msg.content);
            if tokens <= self.settings.assistant_min_tokens {
                continue;
            }
            let mut summary = extractive_summarize(&msg.content, self.settings.compress_target);
            if let Some(range) = index.get(idx) {
                summary.push('\n');
                summary.push_str(&MasterContextIndex::create_reference(
                    master_path,
                    range,
                    tokens,
                    None,
                ));
            }
            // Replace only when the summary actually shrinks the turn.
            if counter.count_text(&summary) < tokens {
                messages[idx] = msg.with_content(summary);
                report.assistant_compressed += 1;
            }
        }

        // Fallback: still over the hard limit after all three phases.
        let mut out = Log::from_messages(messages);
        let hard = ratio_of(limits.context, self.settings.trigger_ratio);
        if hard > 0 && out.token_count(counter) > hard {
            out = reduce_log(&out, hard, counter);
            report.fallback_applied = true;
        }

        report.tokens_after = out.token_count(counter);
        report.messages_after = out.len();
        info!(
            tokens_before = report.tokens_before,
            tokens_after = report.tokens_after,
            reasoning_stripped = report.reasoning_stripped,
            tool_results_archived = report.tool_results_archived,
            assistant_compressed = report.assistant_compressed,
            fallback = report.fallback_applied,
            "compaction pass complete"
        );

        Ok(CompactionOutcome { log: out, report })
    }
}

/// `value * ratio`, saturating at the integer floor.
fn ratio_of(value: u64, ratio: f64) -> u64 {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    {
        (value as f64 * ratio.max(0.0)) as u64
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
