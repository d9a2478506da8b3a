//! Conversation directory layout.
//!
//! One directory per conversation:
//!
//! ```text
//! <chat_id>/
//!   conversation.jsonl        master log (append-only)
//!   .lock                     advisory write lock
//!   branches/<name>.jsonl
//!   views/<name>.jsonl        compacted-001, compacted-002, ...
//!   tool-outputs/<type>/<timestamp>-<hash8>.txt
//! ```

use std::path::{Path, PathBuf};

/// Master log file name.
pub const MASTER_FILE: &str = "conversation.jsonl";

/// Lock file name.
pub const LOCK_FILE: &str = ".lock";

/// Resolved paths inside one conversation directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationPaths {
    root: PathBuf,
}

impl ConversationPaths {
    /// Wrap a conversation directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The conversation directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Master log path (`conversation.jsonl`).
    #[must_use]
    pub fn master(&self) -> PathBuf {
        self.root.join(MASTER_FILE)
    }

    /// Lock file path.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Directory holding non-main branches.
    #[must_use]
    pub fn branches_dir(&self) -> PathBuf {
        self.root.join("branches")
    }

    /// Path for a named branch. `main` maps to the master file.
    #[must_use]
    pub fn branch(&self, name: &str) -> PathBuf {
        if name == crate::manager::MAIN_BRANCH {
            self.master()
        } else {
            self.branches_dir().join(format!("{name}.jsonl"))
        }
    }

    /// Directory holding materialized views.
    #[must_use]
    pub fn views_dir(&self) -> PathBuf {
        self.root.join("views")
    }

    /// Path for a named view.
    #[must_use]
    pub fn view(&self, name: &str) -> PathBuf {
        self.views_dir().join(format!("{name}.jsonl"))
    }

    /// Directory for archived tool outputs of one type.
    #[must_use]
    pub fn tool_outputs_dir(&self, kind: &str) -> PathBuf {
        self.root.join("tool-outputs").join(kind)
    }
}
