//! Conversation manager: branches, views, and persistence.
//!
//! [`ConversationManager`] owns everything under one conversation
//! directory. An active pointer resolves to either a branch or a view;
//! reads and writes redirect accordingly.
//!
//! - **Branches** are independent message sequences; `main` is canonical
//!   and persisted at `conversation.jsonl`, others under `branches/`.
//! - **Views** are materialized compacted alternatives under `views/`.
//!   While a view is active, every append dual-writes to both main (full
//!   fidelity) and the view (model-visible context), in that fixed order,
//!   so the two files are never more than one message apart.
//! - **Undo/edit** snapshot the pre-change state into an auto-numbered
//!   backup branch before touching anything.
//!
//! Construction takes the directory's advisory lock; a second process
//! opening the same directory fails fast. Within one process the manager
//! is not internally thread-safe — callers serialize access.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use quill_core::errors::{QuillError, Result};
use quill_core::log::Log;
use quill_core::message::Message;

use crate::lock::DirLock;
use crate::paths::ConversationPaths;

/// Name of the canonical branch.
pub const MAIN_BRANCH: &str = "main";

/// Prefix for auto-named compaction views.
pub const VIEW_NAME_PREFIX: &str = "compacted-";

// ─────────────────────────────────────────────────────────────────────────────
// Options and auxiliary types
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for opening a conversation directory.
#[derive(Clone, Debug)]
pub struct ManagerOptions {
    /// Branch to activate (created from `main` if absent).
    pub branch: String,
    /// Take the directory's exclusive lock. Skippable for tests.
    pub lock: bool,
    /// Suppress per-append notices.
    pub quiet: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            branch: MAIN_BRANCH.to_string(),
            lock: true,
            quiet: false,
        }
    }
}

/// Where the active pointer currently resolves.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ActiveTarget {
    Branch(String),
    View(String),
}

/// Divergence between two branches.
///
/// Additions are the current branch's suffix past the first divergence,
/// removals the other branch's. Both empty means no diff.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogDiff {
    /// Messages only the current branch has.
    pub additions: Vec<Message>,
    /// Messages only the other branch has.
    pub removals: Vec<Message>,
}

impl LogDiff {
    /// Returns `true` when the logs are identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConversationManager
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of one conversation directory: branches, views, lock, persistence.
#[derive(Debug)]
pub struct ConversationManager {
    paths: ConversationPaths,
    branches: BTreeMap<String, Log>,
    views: BTreeMap<String, Log>,
    active: ActiveTarget,
    lock: Option<DirLock>,
    quiet: bool,
}

impl ConversationManager {
    /// Open (or create) a conversation directory.
    ///
    /// Attempts a non-blocking exclusive lock unless `options.lock` is off;
    /// a held lock is fatal with a distinct
    /// [`QuillError::DirectoryInUse`] — no retry. Loads `main` plus any
    /// existing branches and views.
    pub fn open(dir: impl Into<PathBuf>, options: ManagerOptions) -> Result<Self> {
        let paths = ConversationPaths::new(dir);
        fs::create_dir_all(paths.root())?;

        let lock = if options.lock {
            Some(DirLock::acquire(&paths.lock_file())?)
        } else {
            None
        };

        let mut branches = BTreeMap::new();
        let main = if paths.master().exists() {
            Log::read(&paths.master(), None)?
        } else {
            Log::new()
        };
        let _ = branches.insert(MAIN_BRANCH.to_string(), main);
        load_jsonl_dir(&paths.branches_dir(), &mut branches)?;

        let mut views = BTreeMap::new();
        load_jsonl_dir(&paths.views_dir(), &mut views)?;

        if !branches.contains_key(&options.branch) {
            let seeded = branches[MAIN_BRANCH].clone();
            let _ = branches.insert(options.branch.clone(), seeded);
        }

        info!(
            dir = %paths.root().display(),
            branch = %options.branch,
            branches = branches.len(),
            views = views.len(),
            "opened conversation directory"
        );

        Ok(Self {
            paths,
            branches,
            views,
            active: ActiveTarget::Branch(options.branch),
            lock,
            quiet: options.quiet,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// The conversation directory paths.
    #[must_use]
    pub fn paths(&self) -> &ConversationPaths {
        &self.paths
    }

    /// Name of the active branch or view.
    #[must_use]
    pub fn active_name(&self) -> &str {
        match &self.active {
            ActiveTarget::Branch(name) | ActiveTarget::View(name) => name,
        }
    }

    /// Returns `true` while a view is active.
    #[must_use]
    pub fn view_active(&self) -> bool {
        matches!(self.active, ActiveTarget::View(_))
    }

    /// The log the active pointer resolves to.
    #[must_use]
    pub fn log(&self) -> &Log {
        match &self.active {
            ActiveTarget::Branch(name) => &self.branches[name],
            ActiveTarget::View(name) => &self.views[name],
        }
    }

    /// The canonical `main` log.
    #[must_use]
    pub fn main_log(&self) -> &Log {
        &self.branches[MAIN_BRANCH]
    }

    /// Existing branch names.
    #[must_use]
    pub fn branch_names(&self) -> Vec<String> {
        self.branches.keys().cloned().collect()
    }

    /// Existing view names.
    #[must_use]
    pub fn view_names(&self) -> Vec<String> {
        self.views.keys().cloned().collect()
    }

    // ── Appending ───────────────────────────────────────────────────────

    /// Append a message and persist.
    ///
    /// Content hashes are computed for newly attached files so references
    /// survive later moves or edits of the source. With a view active the
    /// message lands on main first, then the view.
    pub fn append(&mut self, msg: Message) -> Result<()> {
        let msg = self.hash_attachments(msg);

        match self.active.clone() {
            ActiveTarget::View(view) => {
                let main = self.branches[MAIN_BRANCH].append(msg.clone());
                let _ = self.branches.insert(MAIN_BRANCH.to_string(), main);
                let updated = self.views[&view].append(msg.clone());
                let _ = self.views.insert(view, updated);
            }
            ActiveTarget::Branch(branch) => {
                let updated = self.branches[&branch].append(msg.clone());
                let _ = self.branches.insert(branch, updated);
            }
        }
        self.write(false)?;

        if !self.quiet {
            info!(
                role = ?msg.role,
                chars = msg.content.len(),
                target = %self.active_name(),
                "appended message"
            );
        }
        Ok(())
    }

    /// Hash attached files that do not yet have a recorded hash.
    fn hash_attachments(&self, msg: Message) -> Message {
        if msg.files.is_empty() {
            return msg;
        }
        let mut hashes = msg.file_hashes.clone();
        for file in &msg.files {
            if hashes.contains_key(file) {
                continue;
            }
            match fs::read(file) {
                Ok(bytes) => {
                    let digest = Sha256::digest(&bytes);
                    let hex: String = digest
                        .iter()
                        .take(8)
                        .map(|b| format!("{b:02x}"))
                        .collect();
                    let _ = hashes.insert(file.clone(), hex);
                }
                Err(err) => {
                    warn!(file = %file, %err, "could not hash attached file");
                }
            }
        }
        msg.with_file_hashes(hashes)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Write every branch and view to disk.
    ///
    /// The active branch goes to its canonical path and every other branch
    /// and view is written too, so nothing silently diverges from disk.
    /// `sync` forces an OS-level flush (used before risky operations).
    pub fn write(&self, sync: bool) -> Result<()> {
        for (name, log) in &self.branches {
            log.write(&self.paths.branch(name), sync)?;
        }
        for (name, log) in &self.views {
            log.write(&self.paths.view(name), sync)?;
        }
        Ok(())
    }

    /// Flush with an OS-level sync, then release the lock.
    pub fn close(mut self) -> Result<()> {
        self.write(true)?;
        drop(self.lock.take());
        Ok(())
    }

    // ── History editing ─────────────────────────────────────────────────

    /// Pop `n` messages off the active log, snapshotting first.
    ///
    /// The pre-undo state is saved to an auto-numbered backup branch
    /// (`<name>-undo-<seq>`). Popping past the start is a no-op with a
    /// warning.
    pub fn undo(&mut self, n: usize, quiet: bool) -> Result<()> {
        let current = self.log().clone();
        if current.is_empty() || n > current.len() {
            if !quiet {
                warn!(
                    requested = n,
                    available = current.len(),
                    "nothing to undo"
                );
            }
            return Ok(());
        }

        let backup = self.snapshot_backup(&current);
        let mut trimmed = current;
        for _ in 0..n {
            trimmed = trimmed.pop();
        }
        self.replace_active(trimmed);
        self.write(false)?;

        if !quiet {
            info!(popped = n, backup = %backup, "undid messages");
        }
        Ok(())
    }

    /// Replace the active log wholesale, snapshotting first.
    pub fn edit(&mut self, new_log: Log) -> Result<()> {
        let current = self.log().clone();
        let backup = self.snapshot_backup(&current);
        self.replace_active(new_log);
        self.write(false)?;
        info!(backup = %backup, "replaced active log");
        Ok(())
    }

    /// Snapshot `log` into the next `<name>-undo-<seq>` backup branch.
    fn snapshot_backup(&mut self, log: &Log) -> String {
        let prefix = format!("{}-undo-", self.active_name());
        let seq = self
            .branches
            .keys()
            .filter_map(|name| name.strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let name = format!("{prefix}{seq}");
        let _ = self.branches.insert(name.clone(), log.clone());
        name
    }

    fn replace_active(&mut self, log: Log) {
        match self.active.clone() {
            ActiveTarget::Branch(name) => {
                let _ = self.branches.insert(name, log);
            }
            ActiveTarget::View(name) => {
                let _ = self.views.insert(name, log);
            }
        }
    }

    // ── Branching ───────────────────────────────────────────────────────

    /// Switch the active pointer to a branch, creating it if new.
    ///
    /// Always flushes first. A new branch is seeded from the current log.
    pub fn branch(&mut self, name: &str) -> Result<()> {
        self.write(false)?;
        if !self.branches.contains_key(name) {
            let seeded = self.log().clone();
            let _ = self.branches.insert(name.to_string(), seeded);
        }
        self.active = ActiveTarget::Branch(name.to_string());
        self.write(false)?;
        info!(branch = name, "switched branch");
        Ok(())
    }

    /// Walk both logs in lockstep to the first divergence.
    pub fn diff(&self, other: &str) -> Result<LogDiff> {
        let other_log = self
            .branches
            .get(other)
            .ok_or_else(|| QuillError::UnknownBranch(other.to_string()))?;
        let current = self.log();

        let mut split = 0;
        for (a, b) in current.iter().zip(other_log.iter()) {
            if a != b {
                break;
            }
            split += 1;
        }

        Ok(LogDiff {
            additions: current.messages()[split..].to_vec(),
            removals: other_log.messages()[split..].to_vec(),
        })
    }

    /// Copy the whole on-disk directory and re-point at the copy.
    ///
    /// Symlinks are preserved. The fork becomes a sibling directory named
    /// `name`; the current lock moves to the copy.
    pub fn fork(&mut self, name: &str) -> Result<PathBuf> {
        self.write(true)?;

        let parent = self
            .paths
            .root()
            .parent()
            .ok_or_else(|| QuillError::Storage("conversation directory has no parent".into()))?;
        let target = parent.join(name);
        if target.exists() {
            return Err(QuillError::Storage(format!(
                "fork target already exists: {}",
                target.display()
            )));
        }
        copy_dir_recursive(self.paths.root(), &target)?;

        let had_lock = self.lock.take().is_some();
        self.paths = ConversationPaths::new(&target);
        if had_lock {
            self.lock = Some(DirLock::acquire(&self.paths.lock_file())?);
        }

        info!(target = %target.display(), "forked conversation directory");
        Ok(target)
    }

    // ── Views ───────────────────────────────────────────────────────────

    /// Materialize a compacted log as a view and activate it.
    pub fn create_view(&mut self, name: &str, log: Log) -> Result<()> {
        self.write(false)?;
        let _ = self.views.insert(name.to_string(), log);
        self.active = ActiveTarget::View(name.to_string());
        self.write(false)?;
        info!(view = name, "created view");
        Ok(())
    }

    /// Switch to an existing view. Unknown names fail.
    pub fn switch_view(&mut self, name: &str) -> Result<()> {
        self.write(false)?;
        if !self.views.contains_key(name) {
            return Err(QuillError::UnknownView(name.to_string()));
        }
        self.active = ActiveTarget::View(name.to_string());
        info!(view = name, "switched view");
        Ok(())
    }

    /// Point back at the `main` branch.
    pub fn switch_to_master(&mut self) -> Result<()> {
        self.write(false)?;
        self.active = ActiveTarget::Branch(MAIN_BRANCH.to_string());
        Ok(())
    }

    /// Next free `compacted-NNN` view name.
    #[must_use]
    pub fn next_view_name(&self) -> String {
        let next = self
            .views
            .keys()
            .filter_map(|name| name.strip_prefix(VIEW_NAME_PREFIX))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        format!("{VIEW_NAME_PREFIX}{next:03}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Load every `*.jsonl` in `dir` into the map, keyed by file stem.
fn load_jsonl_dir(dir: &Path, into: &mut BTreeMap<String, Log>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let log = Log::read(&path, None)?;
        let _ = into.insert(stem.to_string(), log);
    }
    Ok(())
}

/// Recursive directory copy preserving symlinks.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let to = dst.join(entry.file_name());
        if file_type.is_symlink() {
            copy_symlink(&entry.path(), &to)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &to)?;
        } else {
            let _ = fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    let _ = fs::copy(src, dst)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn open_unlocked(dir: &Path) -> ConversationManager {
        ConversationManager::open(
            dir,
            ManagerOptions {
                lock: false,
                quiet: true,
                ..ManagerOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn open_creates_directory_and_empty_main() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("chat-1");
        let mgr = open_unlocked(&dir);
        assert!(dir.exists());
        assert!(mgr.log().is_empty());
        assert_eq!(mgr.active_name(), MAIN_BRANCH);
    }

    #[test]
    fn append_persists_to_master_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.append(Message::user("hello")).unwrap();

        let on_disk = Log::read(&mgr.paths().master(), None).unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk.get(0).unwrap().content, "hello");
    }

    #[test]
    fn reopen_restores_branches_and_views() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut mgr = open_unlocked(tmp.path());
            mgr.append(Message::user("one")).unwrap();
            mgr.branch("side").unwrap();
            mgr.append(Message::user("two")).unwrap();
            mgr.create_view("compacted-001", Log::new()).unwrap();
        }
        let mgr = open_unlocked(tmp.path());
        assert!(mgr.branch_names().contains(&"side".to_string()));
        assert!(mgr.view_names().contains(&"compacted-001".to_string()));
        assert_eq!(mgr.main_log().len(), 1);
    }

    #[test]
    fn undo_snapshots_backup_branch() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        for text in ["a", "b", "c"] {
            mgr.append(Message::user(text)).unwrap();
        }

        mgr.undo(1, true).unwrap();
        assert_eq!(mgr.log().len(), 2);
        let backup = mgr
            .branch_names()
            .into_iter()
            .find(|n| n.starts_with("main-undo-"))
            .expect("backup branch");
        assert_eq!(mgr.diff(&backup).unwrap().removals.len(), 1);

        // The backup still holds the full pre-undo state on disk.
        let on_disk = Log::read(&mgr.paths().branch(&backup), None).unwrap();
        assert_eq!(on_disk.len(), 3);
    }

    #[test]
    fn undo_past_start_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.undo(1, true).unwrap();
        assert!(mgr.log().is_empty());

        mgr.append(Message::user("only")).unwrap();
        mgr.undo(5, true).unwrap();
        assert_eq!(mgr.log().len(), 1);
    }

    #[test]
    fn backup_branches_number_sequentially() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.append(Message::user("a")).unwrap();
        mgr.undo(1, true).unwrap();
        mgr.append(Message::user("b")).unwrap();
        mgr.undo(1, true).unwrap();

        let names = mgr.branch_names();
        assert!(names.contains(&"main-undo-1".to_string()));
        assert!(names.contains(&"main-undo-2".to_string()));
    }

    #[test]
    fn edit_replaces_wholesale_with_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.append(Message::user("old")).unwrap();

        let replacement = Log::new().append(Message::user("new"));
        mgr.edit(replacement).unwrap();
        assert_eq!(mgr.log().get(0).unwrap().content, "new");
        assert!(mgr
            .branch_names()
            .iter()
            .any(|n| n.starts_with("main-undo-")));
    }

    #[test]
    fn branch_seeds_from_current_log() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.append(Message::user("shared")).unwrap();
        mgr.branch("alt").unwrap();

        assert_eq!(mgr.active_name(), "alt");
        assert_eq!(mgr.log().len(), 1);
        mgr.append(Message::user("alt only")).unwrap();
        assert_eq!(mgr.main_log().len(), 1);
    }

    #[test]
    fn diff_reports_suffixes_past_divergence() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.append(Message::user("shared")).unwrap();
        mgr.branch("alt").unwrap();
        mgr.append(Message::user("mine")).unwrap();

        let diff = mgr.diff(MAIN_BRANCH).unwrap();
        assert_eq!(diff.additions.len(), 1);
        assert_eq!(diff.additions[0].content, "mine");
        assert!(diff.removals.is_empty());
    }

    #[test]
    fn diff_identical_logs_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.append(Message::user("same")).unwrap();
        mgr.branch("copy").unwrap();
        assert!(mgr.diff(MAIN_BRANCH).unwrap().is_empty());
    }

    #[test]
    fn diff_unknown_branch_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = open_unlocked(tmp.path());
        assert_matches!(
            mgr.diff("ghost").unwrap_err(),
            QuillError::UnknownBranch(name) => assert_eq!(name, "ghost")
        );
    }

    #[test]
    fn dual_write_touches_main_then_view() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.append(Message::user("before")).unwrap();
        mgr.create_view("compacted-001", mgr.log().clone()).unwrap();

        for text in ["v1", "v2", "v3"] {
            mgr.append(Message::user(text)).unwrap();
        }

        let main = Log::read(&mgr.paths().master(), None).unwrap();
        let view = Log::read(&mgr.paths().view("compacted-001"), None).unwrap();
        assert_eq!(main.len(), 4);
        assert_eq!(view.len(), 4);
        // Same relative order of the appended suffix.
        let main_tail: Vec<_> = main.messages()[1..].iter().map(|m| &m.content).collect();
        let view_tail: Vec<_> = view.messages()[1..].iter().map(|m| &m.content).collect();
        assert_eq!(main_tail, view_tail);
    }

    #[test]
    fn switch_view_unknown_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        assert_matches!(
            mgr.switch_view("compacted-404").unwrap_err(),
            QuillError::UnknownView(_)
        );
    }

    #[test]
    fn switch_to_master_restores_branch_pointer() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        mgr.create_view("compacted-001", Log::new()).unwrap();
        assert!(mgr.view_active());
        mgr.switch_to_master().unwrap();
        assert!(!mgr.view_active());
        assert_eq!(mgr.active_name(), MAIN_BRANCH);
    }

    #[test]
    fn next_view_name_scans_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        assert_eq!(mgr.next_view_name(), "compacted-001");
        mgr.create_view("compacted-001", Log::new()).unwrap();
        mgr.create_view("compacted-007", Log::new()).unwrap();
        assert_eq!(mgr.next_view_name(), "compacted-008");
    }

    #[test]
    fn fork_copies_directory_and_repoints() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("orig");
        let mut mgr = open_unlocked(&dir);
        mgr.append(Message::user("kept")).unwrap();

        let target = mgr.fork("copy").unwrap();
        assert_eq!(target, tmp.path().join("copy"));
        assert!(target.join("conversation.jsonl").exists());
        assert_eq!(mgr.paths().root(), target);

        // Appends now land in the fork, not the original.
        mgr.append(Message::user("fork only")).unwrap();
        let orig = Log::read(&dir.join("conversation.jsonl"), None).unwrap();
        assert_eq!(orig.len(), 1);
    }

    #[test]
    fn fork_onto_existing_target_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("orig");
        let mut mgr = open_unlocked(&dir);
        fs::create_dir_all(tmp.path().join("taken")).unwrap();
        assert!(mgr.fork("taken").is_err());
    }

    #[test]
    fn append_hashes_attached_files() {
        let tmp = tempfile::tempdir().unwrap();
        let attachment = tmp.path().join("notes.txt");
        fs::write(&attachment, "attached content").unwrap();

        let dir = tmp.path().join("chat");
        let mut mgr = open_unlocked(&dir);
        let msg = Message::user("see attachment")
            .with_files(vec![attachment.to_string_lossy().into_owned()]);
        mgr.append(msg).unwrap();

        let stored = mgr.log().get(0).unwrap();
        let hash = stored
            .file_hashes
            .get(attachment.to_string_lossy().as_ref())
            .expect("hash recorded");
        assert_eq!(hash.len(), 16);
    }

    #[test]
    fn append_missing_attachment_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr = open_unlocked(tmp.path());
        let msg = Message::user("gone").with_files(vec!["/nonexistent/file".into()]);
        mgr.append(msg).unwrap();
        assert!(mgr.log().get(0).unwrap().file_hashes.is_empty());
    }

    #[test]
    fn close_flushes_and_unlocks() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mgr =
            ConversationManager::open(tmp.path(), ManagerOptions::default()).unwrap();
        mgr.append(Message::user("flushed")).unwrap();
        mgr.close().unwrap();

        // Lock is free again.
        let again = ConversationManager::open(tmp.path(), ManagerOptions::default()).unwrap();
        assert_eq!(again.main_log().len(), 1);
    }
}
