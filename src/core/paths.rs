//! core::paths
//!
//! Centralized path routing for mirror storage.
//!
//! # Storage Layout
//!
//! Everything lives under one work root (default `/var/tmp`):
//! - `<repo-name>.git/` - The mirror: a regular, non-bare working copy
//! - `<repo-name>.lock` - Exclusive lock file for that mirror
//!
//! The lock sits beside the mirror rather than inside it, so it is still
//! valid while a corrupted mirror directory is being removed.
//!
//! # Example
//!
//! ```
//! use handoff::core::paths::MirrorPaths;
//! use handoff::core::types::RemoteUrl;
//! use std::path::{Path, PathBuf};
//!
//! let url = RemoteUrl::new("github.com/gutmensch/argocd", "git").unwrap();
//! let paths = MirrorPaths::for_remote(Path::new("/var/tmp"), &url);
//!
//! assert_eq!(paths.mirror_dir(), Path::new("/var/tmp/argocd.git"));
//! assert_eq!(paths.lock_path(), PathBuf::from("/var/tmp/argocd.lock"));
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::RemoteUrl;

/// Locations owned by one mirror.
///
/// No code outside this module should compute mirror or lock file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPaths {
    work_root: PathBuf,
    name: String,
}

impl MirrorPaths {
    /// Paths for the mirror of `remote` under `work_root`.
    pub fn for_remote(work_root: &Path, remote: &RemoteUrl) -> Self {
        Self {
            work_root: work_root.to_path_buf(),
            name: remote.repo_name().to_string(),
        }
    }

    /// The directory all mirrors share.
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Local working copy of the remote.
    pub fn mirror_dir(&self) -> PathBuf {
        self.work_root.join(format!("{}.git", self.name))
    }

    /// Lock file guarding the mirror.
    pub fn lock_path(&self) -> PathBuf {
        self.work_root.join(format!("{}.lock", self.name))
    }

    /// Create the work root if it does not exist yet.
    pub fn ensure_work_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(url: &str) -> MirrorPaths {
        let url = RemoteUrl::new(url, "git").unwrap();
        MirrorPaths::for_remote(Path::new("/work"), &url)
    }

    #[test]
    fn git_suffix_not_doubled() {
        let p = paths("git@example.org:team/site.git");
        assert_eq!(p.mirror_dir(), PathBuf::from("/work/site.git"));
    }

    #[test]
    fn lock_is_outside_mirror() {
        let p = paths("github.com/org/repo");
        assert!(!p.lock_path().starts_with(p.mirror_dir()));
        assert_eq!(p.lock_path().parent(), Some(Path::new("/work")));
    }

    #[test]
    fn ensure_work_root_creates_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("nested/root");
        let url = RemoteUrl::new("github.com/org/repo", "git").unwrap();
        let p = MirrorPaths::for_remote(&root, &url);

        p.ensure_work_root().unwrap();
        assert!(root.is_dir());
        assert_eq!(p.work_root(), root.as_path());
    }
}
