//! # quill-store
//!
//! On-disk conversation storage for the Quill agent.
//!
//! - **Conversation manager**: branches, materialized views, undo/edit with
//!   backup snapshots, fork, diff — all persisted under one directory
//! - **Directory lock**: non-blocking advisory lock enforcing single-writer
//!   exclusivity across processes
//! - **Master context index**: byte-offset index over the master log for
//!   exact recovery of trimmed content
//! - **Output archiver**: content-addressed persistence of oversized tool
//!   outputs before truncation

#![deny(unsafe_code)]

pub mod archive;
pub mod lock;
pub mod manager;
pub mod master_index;
pub mod paths;

pub use archive::{ArchiveOutcome, OutputArchiver};
pub use lock::DirLock;
pub use manager::{ConversationManager, LogDiff, ManagerOptions, MAIN_BRANCH};
pub use master_index::{MasterContextIndex, MessageByteRange};
pub use paths::ConversationPaths;
