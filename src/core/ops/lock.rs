//! core::ops::lock
//!
//! Exclusive lock over one mirror directory.
//!
//! # Storage
//!
//! - `<work_root>/<repo-name>.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock must be held from `ensure()` until the transaction completes
//! - Lock is automatically released on drop
//! - Acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```ignore
//! use handoff::core::ops::lock::MirrorLock;
//!
//! let lock = MirrorLock::acquire(&paths)?;
//! // ensure, write, publish ...
//! drop(lock);
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::MirrorPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("mirror is locked by another process: {0}")]
    AlreadyLocked(PathBuf),

    /// Failed to create the lock file or its directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on a mirror.
///
/// Released when dropped, including during unwinding.
#[derive(Debug)]
pub struct MirrorLock {
    path: PathBuf,
    /// Some while the lock is held.
    file: Option<File>,
}

impl MirrorLock {
    /// Attempt to acquire the lock for the mirror described by `paths`.
    ///
    /// Uses `fs2` advisory locking, which works across processes. Creates
    /// the work root when missing. The holder's PID is written into the
    /// file for diagnostics.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &MirrorPaths) -> Result<Self, LockError> {
        paths.ensure_work_root().map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", paths.work_root().display(), e))
        })?;
        Self::acquire_at(&paths.lock_path())
    }

    /// Attempt to acquire a lock at an explicit file path.
    pub fn acquire_at(path: &Path) -> Result<Self, LockError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e)))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(LockError::AlreadyLocked(path.to_path_buf()))
            }
            Err(e) => {
                // fs2 reports contention as a raw OS error on some platforms
                if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                    return Err(LockError::AlreadyLocked(path.to_path_buf()));
                }
                return Err(LockError::AcquireFailed(e.to_string()));
            }
        }

        // Diagnostics only; a failure here must not cost us the lock.
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());

        tracing::debug!(path = %path.display(), "acquired mirror lock");
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }
}

impl Drop for MirrorLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
            tracing::debug!(path = %self.path.display(), "released mirror lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RemoteUrl;
    use tempfile::TempDir;

    fn test_paths(root: &Path) -> MirrorPaths {
        let url = RemoteUrl::new("github.com/org/config", "git").unwrap();
        MirrorPaths::for_remote(root, &url)
    }

    #[test]
    fn acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(&temp.path().join("work"));

        let _lock = MirrorLock::acquire(&paths).expect("acquire lock");
        assert!(paths.lock_path().exists());
    }

    #[test]
    fn second_acquire_fails() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let _held = MirrorLock::acquire(&paths).expect("first acquire");
        let result = MirrorLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked(_))));
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        {
            let _lock = MirrorLock::acquire(&paths).expect("first acquire");
        }
        assert!(MirrorLock::acquire(&paths).is_ok());
    }

    #[test]
    fn lock_file_records_holder_pid() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let _lock = MirrorLock::acquire(&paths).expect("acquire");
        let content = std::fs::read_to_string(paths.lock_path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn different_mirrors_do_not_contend() {
        let temp = TempDir::new().unwrap();
        let a = MirrorPaths::for_remote(temp.path(), &RemoteUrl::new("h/o/a", "git").unwrap());
        let b = MirrorPaths::for_remote(temp.path(), &RemoteUrl::new("h/o/b", "git").unwrap());

        let _la = MirrorLock::acquire(&a).expect("lock a");
        assert!(MirrorLock::acquire(&b).is_ok());
    }
}
