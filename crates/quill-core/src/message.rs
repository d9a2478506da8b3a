//! Conversation message model.
//!
//! [`Message`] is an immutable value: every "mutation" constructs a new
//! instance with one field replaced (`with_content`, `with_pinned`, ...).
//! Optional fields serialize only when non-default so the JSONL stays
//! compact.
//!
//! Wire format (one JSON object per line):
//!
//! ```text
//! {"role":"user","content":"hi","timestamp":1724371200.5}
//! {"role":"system","content":"...","pinned":true,"call_id":"tc-1"}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Message role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (prompts, tool results).
    System,
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

// ─────────────────────────────────────────────────────────────────────────────
// Token / cost metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Per-message token usage and cost, as reported by the provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Input tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    /// Output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    /// Tokens read from prompt cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    /// Tokens written to prompt cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
    /// Cost in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl MessageMeta {
    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn meta_is_default(meta: &Option<MessageMeta>) -> bool {
    meta.as_ref().is_none_or(MessageMeta::is_empty)
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// One conversation message.
///
/// Construct with [`Message::user`] / [`Message::assistant`] /
/// [`Message::system`]; derive modified copies with the `with_*` methods.
/// Fields are public for reading, but by convention a `Message` is never
/// mutated in place once it has entered a [`crate::Log`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: Role,
    /// Message content.
    pub content: String,
    /// Creation time, seconds since the Unix epoch.
    pub timestamp: f64,
    /// Files attached at append time (paths as given by the user).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Content hashes of attached files, keyed by path.
    ///
    /// Recorded at append time so references survive later moves or edits
    /// of the source file.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub file_hashes: BTreeMap<String, String>,
    /// Exempt from every trimming and compaction pass.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pinned: bool,
    /// Suppressed in the UI but still sent to the model.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hide: bool,
    /// Tool call id this message answers, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Token usage and cost metadata.
    #[serde(default, skip_serializing_if = "meta_is_default")]
    pub metadata: Option<MessageMeta>,
}

impl Message {
    /// Create a message with the given role and content, stamped now.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_epoch_secs(),
            files: Vec::new(),
            file_hashes: BTreeMap::new(),
            pinned: false,
            hide: false,
            call_id: None,
            metadata: None,
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Copy with replaced content.
    #[must_use]
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// Copy with the pinned flag set.
    #[must_use]
    pub fn with_pinned(&self, pinned: bool) -> Self {
        Self {
            pinned,
            ..self.clone()
        }
    }

    /// Copy with the hide flag set.
    #[must_use]
    pub fn with_hide(&self, hide: bool) -> Self {
        Self {
            hide,
            ..self.clone()
        }
    }

    /// Copy with attached files.
    #[must_use]
    pub fn with_files(&self, files: Vec<String>) -> Self {
        Self {
            files,
            ..self.clone()
        }
    }

    /// Copy with file hashes recorded.
    #[must_use]
    pub fn with_file_hashes(&self, file_hashes: BTreeMap<String, String>) -> Self {
        Self {
            file_hashes,
            ..self.clone()
        }
    }

    /// Copy with a tool call id.
    #[must_use]
    pub fn with_call_id(&self, call_id: impl Into<String>) -> Self {
        Self {
            call_id: Some(call_id.into()),
            ..self.clone()
        }
    }

    /// Copy with metadata.
    #[must_use]
    pub fn with_metadata(&self, metadata: MessageMeta) -> Self {
        Self {
            metadata: Some(metadata),
            ..self.clone()
        }
    }

    /// Returns `true` for system messages.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Returns `true` for assistant messages.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Current time as epoch seconds with sub-second precision.
#[must_use]
pub fn now_epoch_secs() -> f64 {
    let now = chrono::Utc::now();
    #[allow(clippy::cast_precision_loss)]
    let secs = now.timestamp() as f64;
    secs + f64::from(now.timestamp_subsec_millis()) / 1000.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
