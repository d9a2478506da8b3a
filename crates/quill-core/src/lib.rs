//! # quill-core
//!
//! Foundation types for the Quill agent's persistence core.
//!
//! - **Message model**: immutable conversation messages with role, content,
//!   attachments, pin/hide flags, and token metadata
//! - **Log**: copy-on-write ordered message sequence with JSONL (de)serialization
//! - **Token oracle**: trait boundary for external token counting plus a
//!   conservative character-based fallback
//! - **Errors**: structured error hierarchy built on `thiserror`

#![deny(unsafe_code)]

pub mod errors;
pub mod log;
pub mod logging;
pub mod message;
pub mod oracle;

pub use errors::{QuillError, RecoveryError, Result};
pub use log::Log;
pub use message::{Message, MessageMeta, Role};
pub use oracle::{CharEstimator, ModelLimits, TokenCounter};
