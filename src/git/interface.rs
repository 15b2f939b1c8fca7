//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations in
//! handoff. Every clone, fetch, commit, branch and push flows through
//! [`Git`], which returns strong types and normalizes errors into typed
//! failure categories.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Path cannot be opened as a repository
//! - [`GitError::BareRepo`]: Repository has no working directory
//! - [`GitError::RemoteNotFound`]: Named remote is not configured
//! - [`GitError::BranchNotFound`]: Branch missing locally or on the remote
//! - [`GitError::Transport`]: Network or authentication failure
//! - [`GitError::PushRejected`]: Remote refused a ref update
//!
//! # Example
//!
//! ```ignore
//! use handoff::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open_mirror(Path::new("/var/tmp/argocd.git"))?;
//! let tip = git.fetch_branch("origin", &branch, &credential)?;
//! git.reset_branch_hard(&branch, &tip)?;
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{BranchName, Oid, RefName, TypeError};
use crate::credentials::Credential;

/// Maximum credential callbacks per remote operation.
///
/// libgit2 asks again after every rejected key, so without a bound a wrong
/// key loops forever.
const MAX_AUTH_ATTEMPTS: u32 = 3;

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Path cannot be opened as a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported: {path}")]
    BareRepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Named remote is not configured.
    #[error("remote not found: {name}")]
    RemoteNotFound {
        /// The remote name
        name: String,
    },

    /// Branch does not exist.
    #[error("branch not found: {name}")]
    BranchNotFound {
        /// The branch (or remote-tracking ref) that was missing
        name: String,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref or branch name.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Network, SSH or authentication failure talking to a remote.
    #[error("{operation} failed: {message}")]
    Transport {
        /// clone, fetch or push
        operation: &'static str,
        /// The transport error message
        message: String,
    },

    /// The remote refused a ref update.
    #[error("push of {refname} rejected: {message}")]
    PushRejected {
        /// The ref that was refused
        refname: String,
        /// Reason reported by the remote
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidRefName {
                message: format!("{}: {}", context, err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    /// Create a transport error for a remote operation.
    fn transport(operation: &'static str, err: git2::Error) -> Self {
        GitError::Transport {
            operation,
            message: err.message().to_string(),
        }
    }

    /// Whether this failure came from talking to a remote.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            GitError::Transport { .. } | GitError::PushRejected { .. }
        )
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) | TypeError::InvalidBranchName(msg) => {
                GitError::InvalidRefName { message: msg }
            }
            TypeError::InvalidPath(msg) | TypeError::InvalidRemote(msg) => {
                GitError::Internal { message: msg }
            }
        }
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Committer name
    pub committer_name: String,
    /// Committer email
    pub committer_email: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. No other module
/// imports `git2`.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

/// Credential callbacks for one remote operation.
fn remote_callbacks(credential: &Credential) -> git2::RemoteCallbacks<'_> {
    let mut attempts = 0u32;
    let mut callbacks = git2::RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_AUTH_ATTEMPTS {
            return Err(git2::Error::from_str("ssh authentication failed"));
        }

        let user = credential.username_for(username_from_url);
        if allowed.is_username() {
            return git2::Cred::username(user);
        }
        if allowed.is_ssh_key() {
            return git2::Cred::ssh_key(
                user,
                Some(credential.public_key()),
                credential.private_key(),
                credential.passphrase(),
            );
        }
        Err(git2::Error::from_str(
            "remote does not accept ssh key authentication",
        ))
    });
    callbacks
}

fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|_| GitError::InvalidOid {
        oid: oid.to_string(),
    })
}

fn from_git2_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Oid::new(oid.to_string()).map_err(GitError::from)
}

impl Git {
    // =========================================================================
    // Repository Opening
    // =========================================================================

    /// Open the repository rooted exactly at `path`.
    ///
    /// Unlike discovery this never walks up to a parent repository, so a
    /// broken mirror nested inside another checkout is still reported.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open_mirror(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo {
                path: path.to_path_buf(),
            });
        }

        Ok(Self { repo })
    }

    /// Clone `url` into `path`, checking out `branch`.
    ///
    /// # Errors
    ///
    /// - [`GitError::Transport`] for any failure reaching the remote
    pub fn clone(
        url: &str,
        path: &Path,
        branch: &BranchName,
        credential: &Credential,
    ) -> Result<Self, GitError> {
        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(credential));

        let repo = git2::build::RepoBuilder::new()
            .branch(branch.as_str())
            .fetch_options(fetch_options)
            .clone(url, path)
            .map_err(|e| GitError::transport("clone", e))?;

        Ok(Self { repo })
    }

    /// Working directory of the repository.
    pub fn workdir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or_else(|| GitError::BareRepo {
            path: self.repo.path().to_path_buf(),
        })
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Point an existing remote at `url`.
    pub fn set_remote_url(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.find_remote(name)?;
        self.repo.remote_set_url(name, url)?;
        Ok(())
    }

    fn find_remote(&self, name: &str) -> Result<git2::Remote<'_>, GitError> {
        self.repo.find_remote(name).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec => GitError::RemoteNotFound {
                name: name.to_string(),
            },
            _ => e.into(),
        })
    }

    /// Fetch one branch from `remote` and return its tip.
    ///
    /// Only `refs/heads/<branch>` is transferred; the remote-tracking ref
    /// `refs/remotes/<remote>/<branch>` is force-updated.
    ///
    /// # Errors
    ///
    /// - [`GitError::RemoteNotFound`] if `remote` is not configured
    /// - [`GitError::Transport`] if the fetch fails
    /// - [`GitError::BranchNotFound`] if the remote has no such branch
    pub fn fetch_branch(
        &self,
        remote: &str,
        branch: &BranchName,
        credential: &Credential,
    ) -> Result<Oid, GitError> {
        let mut handle = self.find_remote(remote)?;
        let tracking = RefName::for_remote_branch(remote, branch);
        let refspec = format!("+{}:{}", RefName::for_branch(branch), tracking);

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(credential));
        handle
            .fetch(&[refspec.as_str()], Some(&mut fetch_options), None)
            .map_err(|e| GitError::transport("fetch", e))?;

        match self.try_resolve_ref(tracking.as_str())? {
            Some(oid) => Ok(oid),
            None => Err(GitError::BranchNotFound {
                name: format!("{}/{}", remote, branch),
            }),
        }
    }

    /// Push a local branch to `remote` under the same name.
    ///
    /// The refspec is never forced.
    ///
    /// # Errors
    ///
    /// - [`GitError::Transport`] if the push cannot be performed
    /// - [`GitError::PushRejected`] if the remote refuses the update
    pub fn push_branch(
        &self,
        remote: &str,
        branch: &BranchName,
        credential: &Credential,
    ) -> Result<(), GitError> {
        let mut handle = self.find_remote(remote)?;
        let refname = RefName::for_branch(branch);
        let refspec = format!("{}:{}", refname, refname);

        let rejection: RefCell<Option<String>> = RefCell::new(None);
        {
            let mut callbacks = remote_callbacks(credential);
            callbacks.push_update_reference(|_ref_name, status| {
                if let Some(msg) = status {
                    *rejection.borrow_mut() = Some(msg.to_string());
                }
                Ok(())
            });

            let mut push_options = git2::PushOptions::new();
            push_options.remote_callbacks(callbacks);

            handle
                .push(&[refspec.as_str()], Some(&mut push_options))
                .map_err(|e| GitError::transport("push", e))?;
        }

        if let Some(message) = rejection.into_inner() {
            return Err(GitError::PushRejected {
                refname: refname.to_string(),
                message,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to its target commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        from_git2_oid(oid)
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Tip of a local branch.
    pub fn branch_tip(&self, branch: &BranchName) -> Result<Oid, GitError> {
        match self.resolve_ref(RefName::for_branch(branch).as_str()) {
            Err(GitError::RefNotFound { .. }) => Err(GitError::BranchNotFound {
                name: branch.to_string(),
            }),
            other => other,
        }
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Short names of all local and remote-tracking branches.
    ///
    /// Remote-tracking names have their remote prefix removed, so
    /// `refs/remotes/origin/automation-abc` contributes `automation-abc`.
    /// Symbolic `<remote>/HEAD` entries are skipped.
    pub fn branch_names(&self) -> Result<BTreeSet<String>, GitError> {
        let mut names = BTreeSet::new();
        for entry in self.repo.branches(None)? {
            let (branch, kind) = entry?;
            let Some(name) = branch.name()? else {
                continue;
            };
            match kind {
                git2::BranchType::Local => {
                    names.insert(name.to_string());
                }
                git2::BranchType::Remote => {
                    if let Some((_, short)) = name.split_once('/') {
                        if short != "HEAD" {
                            names.insert(short.to_string());
                        }
                    }
                }
            }
        }
        Ok(names)
    }

    /// All local branches.
    pub fn local_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let mut branches = Vec::new();
        for entry in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = entry?;
            if let Some(name) = branch.name()? {
                branches.push(BranchName::new(name)?);
            }
        }
        Ok(branches)
    }

    /// Create a local branch pointing at `target`.
    ///
    /// Fails if the branch already exists.
    pub fn create_branch(&self, name: &BranchName, target: &Oid) -> Result<(), GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(target)?)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        self.repo
            .branch(name.as_str(), &commit, false)
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;
        Ok(())
    }

    /// Point HEAD at a local branch and update the working tree to it.
    pub fn checkout_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let refname = RefName::for_branch(name);
        if self.repo.find_reference(refname.as_str()).is_err() {
            return Err(GitError::BranchNotFound {
                name: name.to_string(),
            });
        }
        self.repo.set_head(refname.as_str())?;

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_head(Some(&mut checkout))?;
        Ok(())
    }

    /// Delete a local branch.
    ///
    /// The branch must not be checked out.
    pub fn delete_local_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut branch = self
            .repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .map_err(|_| GitError::BranchNotFound {
                name: name.to_string(),
            })?;
        branch.delete()?;
        Ok(())
    }

    /// Force `branch` to `target`, check it out, and hard-reset.
    ///
    /// Index and working tree end up exactly at `target`: local edits are
    /// discarded and untracked files removed.
    pub fn reset_branch_hard(&self, branch: &BranchName, target: &Oid) -> Result<(), GitError> {
        let oid = to_git2_oid(target)?;
        let refname = RefName::for_branch(branch);
        let object = self
            .repo
            .find_object(oid, Some(git2::ObjectType::Commit))
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        self.repo.reference(
            refname.as_str(),
            oid,
            true,
            &format!("handoff: reset {} to {}", branch, target.short(12)),
        )?;
        self.repo.set_head(refname.as_str())?;

        // A hard reset forces the checkout strategy to FORCE and drops
        // remove_untracked, so untracked files need a second checkout.
        self.repo.reset(&object, git2::ResetType::Hard, None)?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo.checkout_head(Some(&mut checkout))?;
        self.remove_untracked()
    }

    /// Delete whatever the working tree still holds outside the index.
    fn remove_untracked(&self) -> Result<(), GitError> {
        let workdir = self.workdir()?.to_path_buf();
        let mut options = git2::StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(false)
            .include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        for entry in statuses.iter() {
            if !entry.status().contains(git2::Status::WT_NEW) {
                continue;
            }
            let Some(relative) = entry.path() else {
                continue;
            };
            let path = workdir.join(relative.trim_end_matches('/'));
            let removed = match std::fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
                Ok(_) => std::fs::remove_file(&path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            };
            removed.map_err(|e| GitError::Internal {
                message: format!("cannot remove {}: {}", path.display(), e),
            })?;
            tracing::debug!(path = %path.display(), "removed untracked entry");
        }
        Ok(())
    }

    // =========================================================================
    // Index and Commits
    // =========================================================================

    /// Stage every working tree change, including deletions, and persist
    /// the index.
    pub fn stage_all(&self) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    /// Commit the index onto `branch`, advancing the branch ref.
    ///
    /// Author and committer are both `name <email>`. A tree identical to the
    /// branch tip's still produces a commit.
    pub fn commit_on_branch(
        &self,
        branch: &BranchName,
        name: &str,
        email: &str,
        message: &str,
    ) -> Result<Oid, GitError> {
        let refname = RefName::for_branch(branch);
        let parent = self
            .repo
            .find_reference(refname.as_str())
            .and_then(|r| r.peel_to_commit())
            .map_err(|_| GitError::BranchNotFound {
                name: branch.to_string(),
            })?;

        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let signature = git2::Signature::now(name, email)?;
        let oid = self.repo.commit(
            Some(refname.as_str()),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;

        from_git2_oid(oid)
    }

    // =========================================================================
    // Inspection
    //
    // Read-only views used by callers and tests to verify a mirror's state.
    // The ensure and publish paths do not depend on them.
    // =========================================================================

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        from_git2_oid(oid)
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    /// Get information about a commit.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let author = commit.author();
        let committer = commit.committer();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);

        Ok(CommitInfo {
            oid: oid.clone(),
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            committer_name: committer.name().unwrap_or("").to_string(),
            committer_email: committer.email().unwrap_or("").to_string(),
            author_time,
        })
    }

    /// Get the parent OIDs of a commit.
    ///
    /// Returns empty vec for root commits, multiple OIDs for merge commits.
    pub fn commit_parents(&self, oid: &Oid) -> Result<Vec<Oid>, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2_oid(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        commit.parent_ids().map(from_git2_oid).collect()
    }
}
