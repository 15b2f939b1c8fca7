//! engine::error
//!
//! Top-level failure taxonomy and process exit statuses.
//!
//! # Exit Statuses
//!
//! | Error             | Status |
//! |-------------------|--------|
//! | `Configuration`   | 78     |
//! | `Corruption`      | 75     |
//! | `Remote`          | 69     |
//! | `Busy`            | 73     |
//! | `Write`           | 74     |
//! | `Local`           | 1      |
//!
//! The library only reports these; deciding to exit is up to the binary.

use std::path::PathBuf;

use thiserror::Error;

use super::mirror::MirrorError;
use super::writer::WriteError;
use crate::core::config::ConfigError;
use crate::core::ops::lock::LockError;
use crate::credentials::CredentialError;
use crate::git::GitError;

/// Generic failure.
pub const EXIT_FAILURE: i32 = 1;
/// Missing or invalid configuration (`EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;
/// Mirror was corrupt and has been removed (`EX_TEMPFAIL`).
pub const EXIT_CORRUPTION: i32 = 75;
/// Remote unreachable or refused (`EX_UNAVAILABLE`).
pub const EXIT_REMOTE: i32 = 69;
/// Another process holds the mirror (`EX_CANTCREAT`).
pub const EXIT_BUSY: i32 = 73;
/// Content could not be written (`EX_IOERR`).
pub const EXIT_WRITE: i32 = 74;

/// Errors that abort an `ensure` or `publish` run.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Missing credential files or required parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The mirror path existed but was not a usable repository.
    #[error("mirror at {path} is corrupt ({reason}); it has been removed")]
    Corruption { path: PathBuf, reason: String },

    /// Clone or fetch could not reach the remote.
    #[error("remote error: {0}")]
    Remote(GitError),

    /// Another process is working on the same mirror.
    #[error("mirror is busy: lock held at {0}")]
    Busy(PathBuf),

    /// Content could not be materialized in the working tree.
    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    /// Any other local failure.
    #[error("{0}")]
    Local(String),
}

impl PublishError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PublishError::Configuration(_) => EXIT_CONFIG,
            PublishError::Corruption { .. } => EXIT_CORRUPTION,
            PublishError::Remote(_) => EXIT_REMOTE,
            PublishError::Busy(_) => EXIT_BUSY,
            PublishError::Write(_) => EXIT_WRITE,
            PublishError::Local(_) => EXIT_FAILURE,
        }
    }
}

impl From<ConfigError> for PublishError {
    fn from(err: ConfigError) -> Self {
        PublishError::Configuration(err.to_string())
    }
}

impl From<CredentialError> for PublishError {
    fn from(err: CredentialError) -> Self {
        PublishError::Configuration(err.to_string())
    }
}

impl From<LockError> for PublishError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AlreadyLocked(path) => PublishError::Busy(path),
            other => PublishError::Local(other.to_string()),
        }
    }
}

impl From<MirrorError> for PublishError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::Corrupted { path, reason } => PublishError::Corruption { path, reason },
            MirrorError::CleanupFailed { path, reason, source } => PublishError::Corruption {
                path,
                reason: format!("{}; removal failed: {}", reason, source),
            },
            MirrorError::Remote(e) => PublishError::Remote(e),
            MirrorError::Git(e) => PublishError::Local(e.to_string()),
            MirrorError::Io { path, source } => {
                PublishError::Local(format!("{}: {}", path.display(), source))
            }
        }
    }
}

impl From<GitError> for PublishError {
    fn from(err: GitError) -> Self {
        if err.is_remote() {
            PublishError::Remote(err)
        } else {
            PublishError::Local(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let errors = [
            PublishError::Configuration("x".into()),
            PublishError::Corruption {
                path: "/m".into(),
                reason: "bare".into(),
            },
            PublishError::Remote(GitError::Transport {
                operation: "fetch",
                message: "down".into(),
            }),
            PublishError::Busy("/m.lock".into()),
            PublishError::Local("x".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(PublishError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn held_lock_is_busy() {
        let err: PublishError = LockError::AlreadyLocked("/w/r.lock".into()).into();
        assert_eq!(err.exit_code(), EXIT_BUSY);
    }

    #[test]
    fn missing_key_is_configuration() {
        let err: PublishError = CredentialError::EmptyUsername.into();
        assert_eq!(err.exit_code(), EXIT_CONFIG);
    }

    #[test]
    fn git_errors_split_by_origin() {
        let remote: PublishError = GitError::PushRejected {
            refname: "refs/heads/a".into(),
            message: "denied".into(),
        }
        .into();
        assert_eq!(remote.exit_code(), EXIT_REMOTE);

        let local: PublishError = GitError::BranchNotFound { name: "main".into() }.into();
        assert_eq!(local.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn corruption_message_mentions_removal() {
        let err = PublishError::Corruption {
            path: "/var/tmp/argocd.git".into(),
            reason: "not a git repository".into(),
        };
        assert!(err.to_string().contains("removed"));
        assert_eq!(err.exit_code(), EXIT_CORRUPTION);
    }
}
