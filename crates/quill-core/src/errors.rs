//! Error hierarchy for the Quill persistence core.
//!
//! Two layers, both built on [`thiserror`]:
//!
//! - [`QuillError`]: top-level enum covering directory/lock, storage,
//!   branch/view lookup, and session failures
//! - [`RecoveryError`]: byte-range recovery failures with a distinct variant
//!   per cause, so callers can report exactly why a recovery pointer could
//!   not be resolved
//!
//! Per-line I/O and parse problems inside a batch are deliberately *not*
//! errors — they are skipped with a warning at the call site. Only
//! directory-level and lock-level failures abort an operation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, QuillError>;

// ─────────────────────────────────────────────────────────────────────────────
// QuillError — top-level error enum
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the Quill persistence core.
#[derive(Debug, Error)]
pub enum QuillError {
    /// The conversation directory is locked by another live process.
    ///
    /// Fatal at construction; there is no retry.
    #[error("conversation directory already in use by another instance: {dir}")]
    DirectoryInUse {
        /// The contended directory.
        dir: PathBuf,
    },

    /// A named branch does not exist.
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// A named view does not exist.
    #[error("unknown view: {0}")]
    UnknownView(String),

    /// Session registry error (duplicate id, unknown id).
    #[error("session error: {0}")]
    Session(String),

    /// Byte-range recovery failure.
    #[error("recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    /// Generic storage error with context.
    #[error("storage error: {0}")]
    Storage(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// RecoveryError — byte-range recovery failures
// ─────────────────────────────────────────────────────────────────────────────

/// Failure modes when resolving a master-context byte range.
///
/// Recovery is best-effort diagnostic tooling: these surface as messages,
/// never as crashes of the surrounding turn.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The master log file is gone.
    #[error("master log not found: {path}")]
    MissingFile {
        /// Path that was probed.
        path: PathBuf,
    },

    /// The byte range does not fit inside the file.
    #[error("byte range {start}..{end} out of bounds for {path}")]
    InvalidRange {
        /// Master log path.
        path: PathBuf,
        /// Range start (inclusive).
        start: u64,
        /// Range end (exclusive).
        end: u64,
    },

    /// The recovered bytes did not parse as one JSON object.
    #[error("recovered bytes are not valid JSON: {reason}")]
    InvalidJson {
        /// Parser message.
        reason: String,
    },

    /// The recovered JSON object has no `content` field.
    #[error("recovered message has no content field")]
    MissingContent,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_in_use_names_directory() {
        let err = QuillError::DirectoryInUse {
            dir: PathBuf::from("/tmp/chat-1"),
        };
        let msg = err.to_string();
        assert!(msg.contains("already in use"));
        assert!(msg.contains("/tmp/chat-1"));
    }

    #[test]
    fn recovery_error_converts_to_quill_error() {
        let err: QuillError = RecoveryError::MissingContent.into();
        assert!(matches!(err, QuillError::Recovery(_)));
    }

    #[test]
    fn invalid_range_message_includes_bounds() {
        let err = RecoveryError::InvalidRange {
            path: PathBuf::from("conversation.jsonl"),
            start: 10,
            end: 50,
        };
        assert!(err.to_string().contains("10..50"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: QuillError = io.into();
        assert!(matches!(err, QuillError::Io(_)));
    }
}
