//! Cross-process advisory directory lock.
//!
//! Thin wrapper over the platform file lock: one non-blocking try-lock at
//! acquisition, released on drop. A second process opening the same
//! conversation directory fails fast with
//! [`QuillError::DirectoryInUse`] — never a wait, never a retry.
//!
//! The lock only guards against a second OS process. Within one process the
//! conversation manager is not internally thread-safe; callers serialize.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::trace;

use quill_core::errors::{QuillError, Result};

/// Held advisory lock on a conversation directory.
///
/// Dropping the guard releases the lock.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Try to take the exclusive lock at `lock_path`.
    ///
    /// Creates the lock file (and parent directory) if absent. Fails
    /// immediately with [`QuillError::DirectoryInUse`] when another live
    /// process holds the lock.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::options()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(true) => {
                trace!(path = %lock_path.display(), "acquired directory lock");
                Ok(Self {
                    file,
                    path: lock_path.to_path_buf(),
                })
            }
            Ok(false) => Err(QuillError::DirectoryInUse {
                dir: lock_path
                    .parent()
                    .unwrap_or(lock_path)
                    .to_path_buf(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        trace!(path = %self.path.display(), "released directory lock");
    }
}
