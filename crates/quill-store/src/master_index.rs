//! Byte-offset index over the master log.
//!
//! [`MasterContextIndex::build`] scans the raw bytes of
//! `conversation.jsonl` line by line — no JSON re-parsing — and records the
//! exact byte span of each message line. Compaction embeds those spans as
//! recovery pointers; [`MasterContextIndex::recover`] resolves one back to
//! the original content.
//!
//! The index is rebuilt on demand immediately before each compaction pass,
//! never kept continuously in sync: a rebuild is cheap relative to an LLM
//! round trip and avoids sync issues with concurrent appends.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde_json::Value;
use tracing::trace;

use quill_core::errors::RecoveryError;
use quill_core::errors::Result;

/// Exact byte span of one JSON line in the master log.
///
/// `start..end` excludes the trailing newline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageByteRange {
    /// Zero-based message index.
    pub index: usize,
    /// First byte of the line (inclusive).
    pub start: u64,
    /// One past the last byte of the line (exclusive).
    pub end: u64,
}

/// Byte-offset index over a master log file.
#[derive(Clone, Debug, Default)]
pub struct MasterContextIndex {
    ranges: Vec<MessageByteRange>,
}

impl MasterContextIndex {
    /// Build the index by scanning the master log's raw bytes.
    ///
    /// A missing file yields an empty index, not an error. Blank lines are
    /// skipped so indexes line up with the parsed message sequence.
    pub fn build(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path)?;
        let mut ranges = Vec::new();
        let mut start = 0usize;

        for (pos, byte) in bytes.iter().enumerate() {
            if *byte == b'\n' {
                push_line(&mut ranges, start, pos, &bytes);
                start = pos + 1;
            }
        }
        // Trailing line without a newline (interrupted write).
        push_line(&mut ranges, start, bytes.len(), &bytes);

        trace!(path = %path.display(), lines = ranges.len(), "built master context index");
        Ok(Self { ranges })
    }

    /// Byte range for message `index`, if indexed.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&MessageByteRange> {
        self.ranges.get(index)
    }

    /// Number of indexed lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Recover the original content for a byte range.
    ///
    /// Reads exactly `range.start..range.end`, parses the slice as one JSON
    /// object, and returns its `content` field. Invalid UTF-8 is replaced
    /// with U+FFFD rather than raised — recovery is best-effort diagnostic
    /// tooling.
    pub fn recover(
        path: &Path,
        range: &MessageByteRange,
    ) -> std::result::Result<String, RecoveryError> {
        let mut file = File::open(path).map_err(|_| RecoveryError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let len = file
            .metadata()
            .map_err(|_| RecoveryError::MissingFile {
                path: path.to_path_buf(),
            })?
            .len();

        if range.start >= range.end || range.end > len {
            return Err(RecoveryError::InvalidRange {
                path: path.to_path_buf(),
                start: range.start,
                end: range.end,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        file.seek(SeekFrom::Start(range.start))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|_| RecoveryError::InvalidRange {
                path: path.to_path_buf(),
                start: range.start,
                end: range.end,
            })?;

        let text = String::from_utf8_lossy(&buf);
        let value: Value =
            serde_json::from_str(&text).map_err(|err| RecoveryError::InvalidJson {
                reason: err.to_string(),
            })?;

        value
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(RecoveryError::MissingContent)
    }

    /// Render a recovery pointer for content removed at `range`.
    ///
    /// The reference is embedded in place of truncated content; it carries
    /// the original token count, file, byte span, an optional preview, and
    /// recovery instructions.
    #[must_use]
    pub fn create_reference(
        path: &Path,
        range: &MessageByteRange,
        tokens: u64,
        preview: Option<&str>,
    ) -> String {
        let mut out = format!(
            "[removed: ~{tokens} tokens]\n[master-context: file={} bytes={}..{} index={}]",
            path.display(),
            range.start,
            range.end,
            range.index,
        );
        if let Some(preview) = preview {
            let short: String = preview.chars().take(200).collect();
            out.push_str("\npreview: ");
            out.push_str(&short);
        }
        out.push_str(
            "\nrecover: read the byte range above from the file and parse it as one JSON message",
        );
        out
    }
}

fn push_line(ranges: &mut Vec<MessageByteRange>, start: usize, end: usize, bytes: &[u8]) {
    let line = &bytes[start..end];
    if line.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    ranges.push(MessageByteRange {
        index: ranges.len(),
        start: start as u64,
        end: end as u64,
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
