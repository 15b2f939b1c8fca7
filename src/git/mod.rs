//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Clone, fetch, reset, commit,
//! branch and push all flow through [`Git`]. No other module should import
//! `git2`.
//!
//! # Responsibilities
//!
//! - Opening mirrors (never discovering a parent repository)
//! - Authenticated clone, fetch and push with a key pair
//! - Hard reset of a branch and its working tree
//! - Staging, committing and branch management
//! - Commit inspection
//!
//! # Invariants
//!
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, BranchName, RefName)
//! - Pushes are never forced
//!
//! # Example
//!
//! ```ignore
//! use handoff::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open_mirror(Path::new("/var/tmp/argocd.git"))?;
//! let names = git.branch_names()?;
//! git.push_branch("origin", &ephemeral, &credential)?;
//! ```

mod interface;

pub use interface::{CommitInfo, Git, GitError};
