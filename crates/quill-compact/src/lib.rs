//! # quill-compact
//!
//! Token-budget compaction for the Quill agent.
//!
//! - **Compaction engine**: trigger check, savings estimate, and the
//!   three-phase reduction (reasoning stripping, largest-first tool-result
//!   elimination, extractive compression of long assistant turns)
//! - **Extractive summarizer**: sentence scoring with precompiled phrase
//!   tables; fenced code is lifted out and never dropped
//! - **Fallback reducer**: guaranteed-terminating line truncation plus the
//!   newest-first `limit_log` pass
//!
//! Pinned messages are exempt from every pass here, and everything removed
//! carries a recovery pointer (archive file or master-context byte range).

#![deny(unsafe_code)]

pub mod blocks;
pub mod engine;
pub mod reasoning;
pub mod reducer;
pub mod settings;
pub mod summarize;

pub use engine::{CompactionEngine, CompactionOutcome, CompactionReport, SavingsEstimate};
pub use reducer::{limit_log, reduce_log};
pub use settings::CompactionSettings;
pub use summarize::extractive_summarize;
