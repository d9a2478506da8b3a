//! Immutable, ordered message log with JSONL persistence.
//!
//! [`Log`] is a copy-on-write value: [`Log::append`] and [`Log::pop`] return
//! new logs and never mutate in place. Snapshots taken at branch or backup
//! points are therefore plain clones and can never alias a live log.
//!
//! Reading is lenient by design: a line that fails to parse is skipped with
//! a warning, not fatal — a crashed write leaving a truncated trailing line
//! must not make history unreadable.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tracing::warn;

use crate::errors::Result;
use crate::message::Message;
use crate::oracle::TokenCounter;

// ─────────────────────────────────────────────────────────────────────────────
// Log
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered, immutable message sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Log {
    messages: Vec<Message>,
}

impl Log {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log from an owned message sequence.
    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Return a new log with `msg` appended.
    #[must_use]
    pub fn append(&self, msg: Message) -> Self {
        let mut messages = self.messages.clone();
        messages.push(msg);
        Self { messages }
    }

    /// Return a new log with the last message removed.
    ///
    /// Popping an empty log is a no-op returning empty, not an error.
    #[must_use]
    pub fn pop(&self) -> Self {
        let mut messages = self.messages.clone();
        let _ = messages.pop();
        Self { messages }
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the log holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Last message, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The underlying message slice.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterate over messages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Total token count, delegated to the external oracle.
    #[must_use]
    pub fn token_count(&self, counter: &dyn TokenCounter) -> u64 {
        counter.count_messages(&self.messages)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Read a log from a JSONL file.
    ///
    /// Parses at most `limit` lines when given. Unparseable lines are
    /// skipped with a warning; only file-level I/O failures are errors.
    pub fn read(path: &Path, limit: Option<usize>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut messages = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            if let Some(max) = limit {
                if messages.len() >= max {
                    break;
                }
            }
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(&line) {
                Ok(msg) => messages.push(msg),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        %err,
                        "skipping malformed JSONL line"
                    );
                }
            }
        }

        Ok(Self { messages })
    }

    /// Write the log as one JSON object per line, in order.
    ///
    /// When `sync` is set the file is flushed to disk with an OS-level
    /// sync before returning (used ahead of risky operations).
    pub fn write(&self, path: &Path, sync: bool) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        for msg in &self.messages {
            serde_json::to_writer(&mut file, msg)?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Log {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
