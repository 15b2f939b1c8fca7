//! engine::mirror
//!
//! The local working copy of one remote repository.
//!
//! # Ensure
//!
//! [`RepositoryMirror::ensure`] either clones the remote into the mirror
//! path or opens the existing mirror and refreshes it:
//!
//! 1. Open the path as a non-bare repository whose `origin` points at the
//!    configured remote. An `origin` that differs only cosmetically (ssh
//!    user, trailing slash, `.git` suffix) is rewritten in place. Anything
//!    else is corruption: the path is removed and
//!    [`MirrorError::Corrupted`] is returned.
//! 2. Fetch the protected branch from `origin` only.
//! 3. Force the local protected branch to the fetched tip, check it out and
//!    hard-reset, discarding local edits and untracked files.
//! 4. Delete leftover local ephemeral branches.
//!
//! Running `ensure` twice in a row leaves an identical working tree.
//!
//! # Invariants
//!
//! - The caller holds the [`MirrorLock`](crate::core::ops::lock::MirrorLock)
//! - No partial repair is attempted on a corrupt mirror

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::Settings;
use crate::core::naming::BranchNameGenerator;
use crate::core::paths::MirrorPaths;
use crate::core::types::{BranchName, Fingerprint, Oid, RemoteUrl};
use crate::credentials::Credential;
use crate::git::{Git, GitError};

/// The only remote a mirror talks to.
pub const ORIGIN: &str = "origin";

/// Errors from mirror operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The mirror was unusable and has been removed.
    #[error("mirror at {path} is corrupt: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// The mirror was unusable and could not be removed.
    #[error("mirror at {path} is corrupt ({reason}) and could not be removed: {source}")]
    CleanupFailed {
        path: PathBuf,
        reason: String,
        source: std::io::Error,
    },

    /// Clone or fetch failed to reach the remote.
    #[error(transparent)]
    Remote(GitError),

    /// A local repository operation failed.
    #[error(transparent)]
    Git(GitError),

    /// Filesystem error outside git.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<GitError> for MirrorError {
    fn from(err: GitError) -> Self {
        MirrorError::Git(err)
    }
}

/// State of the mirror after a successful ensure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorState {
    /// Tip of the protected branch, equal to the remote's tip.
    pub tip: Oid,
    /// Hash of the working tree contents.
    pub fingerprint: Fingerprint,
    /// Whether the mirror was freshly cloned.
    pub cloned: bool,
}

/// One local mirror tracking one protected branch.
#[derive(Debug, Clone)]
pub struct RepositoryMirror {
    paths: MirrorPaths,
    remote: RemoteUrl,
    branch: BranchName,
    naming: BranchNameGenerator,
}

impl RepositoryMirror {
    /// Create a mirror handle. Nothing touches the disk yet.
    pub fn new(
        paths: MirrorPaths,
        remote: RemoteUrl,
        branch: BranchName,
        naming: BranchNameGenerator,
    ) -> Self {
        Self {
            paths,
            remote,
            branch,
            naming,
        }
    }

    /// Create a mirror handle from resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.paths(),
            settings.remote.clone(),
            settings.branch.clone(),
            settings.naming.clone(),
        )
    }

    /// Directory holding the working copy.
    pub fn path(&self) -> PathBuf {
        self.paths.mirror_dir()
    }

    /// Storage locations of this mirror.
    pub fn paths(&self) -> &MirrorPaths {
        &self.paths
    }

    /// The protected branch.
    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Clone or refresh the mirror so it matches the remote tip.
    ///
    /// # Errors
    ///
    /// - [`MirrorError::Corrupted`] if the path existed but was unusable
    ///   (it no longer exists when this is returned)
    /// - [`MirrorError::Remote`] if the remote could not be reached
    pub fn ensure(&self, credential: &Credential) -> Result<(Git, MirrorState), MirrorError> {
        let dir = self.path();

        // symlink_metadata so a dangling symlink counts as present
        if dir.symlink_metadata().is_err() {
            return self.clone_fresh(&dir, credential);
        }

        let git = self.open_existing(&dir)?;

        let tip = git
            .fetch_branch(ORIGIN, &self.branch, credential)
            .map_err(MirrorError::Remote)?;
        git.reset_branch_hard(&self.branch, &tip)?;
        self.prune_ephemeral(&git)?;

        let state = self.state(&git, tip, false)?;
        tracing::info!(
            path = %dir.display(),
            branch = %self.branch,
            tip = %state.tip.short(12),
            "mirror refreshed"
        );
        Ok((git, state))
    }

    fn clone_fresh(
        &self,
        dir: &Path,
        credential: &Credential,
    ) -> Result<(Git, MirrorState), MirrorError> {
        self.paths.ensure_work_root().map_err(|e| MirrorError::Io {
            path: self.paths.work_root().to_path_buf(),
            source: e,
        })?;

        tracing::info!(remote = %self.remote, path = %dir.display(), "cloning mirror");
        let git = match Git::clone(self.remote.as_str(), dir, &self.branch, credential) {
            Ok(git) => git,
            Err(e) => {
                // A half-written clone would look corrupt next time.
                if dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(dir) {
                        tracing::warn!(
                            path = %dir.display(),
                            error = %cleanup,
                            "failed to remove partial clone"
                        );
                    }
                }
                return Err(MirrorError::Remote(e));
            }
        };

        let tip = git.branch_tip(&self.branch)?;
        let state = self.state(&git, tip, true)?;
        tracing::info!(tip = %state.tip.short(12), "mirror cloned");
        Ok((git, state))
    }

    /// Open the mirror and check it belongs to the configured remote.
    fn open_existing(&self, dir: &Path) -> Result<Git, MirrorError> {
        let git = match Git::open_mirror(dir) {
            Ok(git) => git,
            Err(e) => return Err(self.destroy(dir, e.to_string())),
        };

        let mismatch = match git.remote_url(ORIGIN) {
            Ok(Some(url)) if url == self.remote.as_str() => None,
            Ok(Some(url)) if self.remote.same_repository(&url) => {
                tracing::info!(from = %url, to = %self.remote, "rewriting origin url");
                git.set_remote_url(ORIGIN, self.remote.as_str())
                    .err()
                    .map(|e| e.to_string())
            }
            Ok(Some(url)) => Some(format!("origin points at {}", url)),
            Ok(None) => Some("no origin remote".to_string()),
            Err(e) => Some(e.to_string()),
        };

        match mismatch {
            None => Ok(git),
            Some(reason) => {
                drop(git);
                Err(self.destroy(dir, reason))
            }
        }
    }

    /// Remove a corrupt mirror.
    fn destroy(&self, dir: &Path, reason: String) -> MirrorError {
        tracing::error!(path = %dir.display(), %reason, "mirror is corrupt, removing it");

        let removed = match dir.symlink_metadata() {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(dir),
            Ok(_) => fs::remove_file(dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };

        match removed {
            Ok(()) => MirrorError::Corrupted {
                path: dir.to_path_buf(),
                reason,
            },
            Err(source) => MirrorError::CleanupFailed {
                path: dir.to_path_buf(),
                reason,
                source,
            },
        }
    }

    /// Delete local branches left behind by an interrupted transaction.
    fn prune_ephemeral(&self, git: &Git) -> Result<(), MirrorError> {
        for branch in git.local_branches()? {
            if branch != self.branch && self.naming.is_ephemeral(branch.as_str()) {
                tracing::warn!(branch = %branch, "deleting leftover ephemeral branch");
                git.delete_local_branch(&branch)?;
            }
        }
        Ok(())
    }

    fn state(&self, git: &Git, tip: Oid, cloned: bool) -> Result<MirrorState, MirrorError> {
        let workdir = git.workdir()?;
        let fingerprint = Fingerprint::of_worktree(workdir).map_err(|e| MirrorError::Io {
            path: workdir.to_path_buf(),
            source: e,
        })?;
        Ok(MirrorState {
            tip,
            fingerprint,
            cloned,
        })
    }
}
