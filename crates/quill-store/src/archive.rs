//! Content-addressed archive for oversized tool outputs.
//!
//! Before compaction truncates a large output, [`OutputArchiver`] persists
//! it verbatim under `tool-outputs/<type>/<timestamp>-<hash8>.txt` and
//! returns a short summary to embed in its place. Archive files are
//! write-once: the same content always maps to the same name and is never
//! rewritten.

use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use quill_core::errors::Result;

use crate::paths::ConversationPaths;

/// How many leading lines are scanned for a command prefix.
const COMMAND_SCAN_LINES: usize = 10;

/// Result of archiving one output.
#[derive(Clone, Debug)]
pub struct ArchiveOutcome {
    /// Short human-readable summary (size, command, archive path).
    pub summary: String,
    /// Archive file, when a conversation directory was available.
    pub path: Option<PathBuf>,
}

/// Persists oversized outputs before truncation.
#[derive(Clone, Debug)]
pub struct OutputArchiver {
    paths: Option<ConversationPaths>,
}

impl OutputArchiver {
    /// Create an archiver rooted at a conversation directory.
    #[must_use]
    pub fn new(paths: ConversationPaths) -> Self {
        Self { paths: Some(paths) }
    }

    /// Create an archiver with no backing directory.
    ///
    /// Outputs are discarded; the summary says so.
    #[must_use]
    pub fn detached() -> Self {
        Self { paths: None }
    }

    /// Archive `content` under the given output type.
    pub fn archive(&self, kind: &str, content: &str) -> Result<ArchiveOutcome> {
        let bytes = content.len();
        let lines = content.lines().count();
        let command = detect_command(content);

        let Some(paths) = &self.paths else {
            let mut summary =
                format!("[output discarded: {bytes} bytes, {lines} lines; no conversation directory]");
            if let Some(cmd) = &command {
                summary.push_str(&format!("\ncommand: {cmd}"));
            }
            return Ok(ArchiveOutcome {
                summary,
                path: None,
            });
        };

        let dir = paths.tool_outputs_dir(&sanitize_kind(kind));
        fs::create_dir_all(&dir)?;

        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let hash = content_hash8(content);
        let path = dir.join(format!("{stamp}-{hash}.txt"));

        // Write-once: identical content at the same second already exists.
        if path.exists() {
            warn!(path = %path.display(), "archive file already present, keeping original");
        } else {
            fs::write(&path, content)?;
            info!(path = %path.display(), bytes, lines, "archived oversized output");
        }

        let mut summary = format!("[output archived: {bytes} bytes, {lines} lines]");
        if let Some(cmd) = &command {
            summary.push_str(&format!("\ncommand: {cmd}"));
        }
        summary.push_str(&format!("\nsaved to: {}", path.display()));

        Ok(ArchiveOutcome {
            summary,
            path: Some(path),
        })
    }
}

/// First 8 hex chars of the content's SHA-256.
#[must_use]
pub fn content_hash8(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(8);
    for byte in &digest[..4] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Look for a recognizable command prefix in the first few lines.
fn detect_command(content: &str) -> Option<String> {
    for line in content.lines().take(COMMAND_SCAN_LINES) {
        let trimmed = line.trim();
        for prefix in ["$ ", "> ", "Command: "] {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                if !rest.is_empty() {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

fn sanitize_kind(kind: &str) -> String {
    let cleaned: String = kind
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "output".to_string()
    } else {
        cleaned
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archives_content_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = OutputArchiver::new(ConversationPaths::new(dir.path()));
        let content = "$ cargo test\nrunning 120 tests\n...";

        let outcome = archiver.archive("bash", content).unwrap();
        let path = outcome.path.expect("archived path");
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
        assert!(path.starts_with(dir.path().join("tool-outputs/bash")));
        assert!(path.extension().is_some_and(|e| e == "txt"));
    }

    #[test]
    fn summary_reports_size_and_command() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = OutputArchiver::new(ConversationPaths::new(dir.path()));
        let content = "$ rg TODO src/\nsrc/a.rs:1: TODO fix";

        let outcome = archiver.archive("bash", content).unwrap();
        assert!(outcome.summary.contains("bytes"));
        assert!(outcome.summary.contains("command: rg TODO src/"));
        assert!(outcome.summary.contains("saved to:"));
    }

    #[test]
    fn detached_archiver_discards_with_notice() {
        let archiver = OutputArchiver::detached();
        let outcome = archiver.archive("bash", "big output").unwrap();
        assert!(outcome.path.is_none());
        assert!(outcome.summary.contains("discarded"));
        assert!(outcome.summary.contains("no conversation directory"));
    }

    #[test]
    fn hash_is_stable_and_short() {
        assert_eq!(content_hash8("abc").len(), 8);
        assert_eq!(content_hash8("abc"), content_hash8("abc"));
        assert_ne!(content_hash8("abc"), content_hash8("abd"));
    }

    #[test]
    fn command_detection_scans_only_leading_lines() {
        let mut content = String::new();
        for i in 0..COMMAND_SCAN_LINES {
            content.push_str(&format!("line {i}\n"));
        }
        content.push_str("$ hidden command\n");
        assert_eq!(detect_command(&content), None);
    }

    #[test]
    fn kind_is_sanitized() {
        assert_eq!(sanitize_kind("bash"), "bash");
        assert_eq!(sanitize_kind("../etc"), "___etc");
        assert_eq!(sanitize_kind(""), "output");
    }
}
