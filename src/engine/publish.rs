//! engine::publish
//!
//! The commit-then-ephemeral-branch hand-off.
//!
//! # Protocol
//!
//! 1. **Stage** every working tree change and persist the index
//! 2. **Commit** on the protected branch as the automation identity
//! 3. **Name** a fresh ephemeral branch
//! 4. **Branch** it at the protected branch's new tip and check it out
//! 5. **Push** only the ephemeral branch to `origin`
//! 6. **Restore**: check out the protected branch, delete the local
//!    ephemeral branch
//!
//! The remote's protected branch is never written. The remote ephemeral
//! branch stays behind for whatever review or merge process consumes it.
//!
//! # Outcomes
//!
//! Failures inside the protocol do not abort the run. They are reported as
//! a [`PublishOutcome`] that tells the caller whether anything was
//! committed and whether it reached the remote. Restore runs whenever a
//! local ephemeral branch was created, whatever happened afterwards.

use std::fmt;

use serde::Serialize;

use super::mirror::ORIGIN;
use crate::core::config::Identity;
use crate::core::naming::BranchNameGenerator;
use crate::core::types::{BranchName, Oid, RepoPath};
use crate::credentials::Credential;
use crate::git::{Git, GitError};

/// Protocol step at which a transaction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStage {
    Stage,
    Commit,
    Name,
    Branch,
    Checkout,
    Push,
}

impl fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStage::Stage => "stage",
            TransactionStage::Commit => "commit",
            TransactionStage::Name => "name",
            TransactionStage::Branch => "branch",
            TransactionStage::Checkout => "checkout",
            TransactionStage::Push => "push",
        };
        f.write_str(s)
    }
}

/// What a transaction achieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Committed and pushed under `branch`.
    Published { commit: Oid, branch: BranchName },

    /// Committed locally, but the ephemeral branch did not reach the remote.
    CommittedNotPushed {
        commit: Oid,
        branch: Option<BranchName>,
        stage: TransactionStage,
        reason: String,
    },

    /// Failed before anything was committed.
    NotCommitted {
        stage: TransactionStage,
        reason: String,
    },
}

impl PublishOutcome {
    /// The new commit, if one was made.
    pub fn commit(&self) -> Option<&Oid> {
        match self {
            PublishOutcome::Published { commit, .. }
            | PublishOutcome::CommittedNotPushed { commit, .. } => Some(commit),
            _ => None,
        }
    }

    /// Whether the run achieved its goal.
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            PublishOutcome::Published { .. } => 0,
            PublishOutcome::CommittedNotPushed { .. } => 3,
            PublishOutcome::NotCommitted { .. } => 4,
        }
    }
}

/// Outcome plus anything that went wrong while restoring local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    #[serde(flatten)]
    pub outcome: PublishOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_error: Option<String>,
}

impl TransactionReport {
    fn new(outcome: PublishOutcome) -> Self {
        Self {
            outcome,
            restore_error: None,
        }
    }
}

/// A failed step.
struct StepFailure {
    stage: TransactionStage,
    reason: String,
}

fn at(stage: TransactionStage) -> impl FnOnce(GitError) -> StepFailure {
    move |err| StepFailure {
        stage,
        reason: err.to_string(),
    }
}

/// Commit message for a publish of `path` under `topic`.
///
/// ```
/// use handoff::core::types::RepoPath;
/// use handoff::engine::publish::commit_message;
///
/// let path = RepoPath::new("bla/fritzbox.json").unwrap();
/// assert_eq!(
///     commit_message("dyndns update", &path),
///     "chore(update): dyndns update bla/fritzbox.json"
/// );
/// ```
pub fn commit_message(topic: &str, path: &RepoPath) -> String {
    format!("chore(update): {} {}", topic, path)
}

/// One publish against an ensured mirror.
pub struct PublishTransaction<'a> {
    git: &'a Git,
    branch: &'a BranchName,
    identity: &'a Identity,
    naming: &'a BranchNameGenerator,
    credential: &'a Credential,
}

impl<'a> PublishTransaction<'a> {
    pub fn new(
        git: &'a Git,
        branch: &'a BranchName,
        identity: &'a Identity,
        naming: &'a BranchNameGenerator,
        credential: &'a Credential,
    ) -> Self {
        Self {
            git,
            branch,
            identity,
            naming,
            credential,
        }
    }

    /// Run the protocol for content already written at `path`.
    pub fn commit_and_publish(&self, topic: &str, path: &RepoPath) -> TransactionReport {
        let commit = match self.commit(&commit_message(topic, path)) {
            Ok(commit) => commit,
            Err(failure) => {
                tracing::error!(stage = %failure.stage, reason = %failure.reason, "publish failed");
                return TransactionReport::new(PublishOutcome::NotCommitted {
                    stage: failure.stage,
                    reason: failure.reason,
                });
            }
        };
        tracing::info!(commit = %commit.short(12), branch = %self.branch, "committed locally");

        let mut created = None;
        let outcome = match self.hand_off(&mut created) {
            Ok(ephemeral) => {
                tracing::info!(branch = %ephemeral, commit = %commit.short(12), "published");
                PublishOutcome::Published {
                    commit,
                    branch: ephemeral,
                }
            }
            Err(failure) => {
                tracing::error!(
                    stage = %failure.stage,
                    reason = %failure.reason,
                    commit = %commit.short(12),
                    "commit not pushed"
                );
                PublishOutcome::CommittedNotPushed {
                    commit,
                    branch: created.clone(),
                    stage: failure.stage,
                    reason: failure.reason,
                }
            }
        };

        let restore_error = created.and_then(|ephemeral| match self.restore(&ephemeral) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(branch = %ephemeral, error = %e, "failed to restore protected branch");
                Some(e.to_string())
            }
        });

        TransactionReport {
            outcome,
            restore_error,
        }
    }

    /// Steps 1 and 2.
    fn commit(&self, message: &str) -> Result<Oid, StepFailure> {
        self.git.stage_all().map_err(at(TransactionStage::Stage))?;
        self.git
            .commit_on_branch(
                self.branch,
                &self.identity.name,
                &self.identity.email,
                message,
            )
            .map_err(at(TransactionStage::Commit))
    }

    /// Steps 3 to 5. Sets `created` once a local branch exists.
    fn hand_off(&self, created: &mut Option<BranchName>) -> Result<BranchName, StepFailure> {
        let existing = self
            .git
            .branch_names()
            .map_err(at(TransactionStage::Name))?;
        let ephemeral = self
            .naming
            .generate(&existing)
            .map_err(|e| StepFailure {
                stage: TransactionStage::Name,
                reason: e.to_string(),
            })?;

        let target = self
            .git
            .branch_tip(self.branch)
            .map_err(at(TransactionStage::Branch))?;
        self.git
            .create_branch(&ephemeral, &target)
            .map_err(at(TransactionStage::Branch))?;
        *created = Some(ephemeral.clone());

        self.git
            .checkout_branch(&ephemeral)
            .map_err(at(TransactionStage::Checkout))?;

        self.git
            .push_branch(ORIGIN, &ephemeral, self.credential)
            .map_err(at(TransactionStage::Push))?;

        Ok(ephemeral)
    }

    /// Step 6.
    fn restore(&self, ephemeral: &BranchName) -> Result<(), GitError> {
        self.git.checkout_branch(self.branch)?;
        self.git.delete_local_branch(ephemeral)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid() -> Oid {
        Oid::new("a".repeat(40)).unwrap()
    }

    #[test]
    fn exit_codes() {
        let published = PublishOutcome::Published {
            commit: oid(),
            branch: BranchName::new("automation-abc").unwrap(),
        };
        let not_pushed = PublishOutcome::CommittedNotPushed {
            commit: oid(),
            branch: None,
            stage: TransactionStage::Push,
            reason: "denied".into(),
        };
        let not_committed = PublishOutcome::NotCommitted {
            stage: TransactionStage::Stage,
            reason: "locked".into(),
        };

        assert_eq!(published.exit_code(), 0);
        assert_eq!(not_pushed.exit_code(), 3);
        assert_eq!(not_committed.exit_code(), 4);
        assert!(published.is_success());
        assert!(!not_pushed.is_success());
        assert_eq!(not_pushed.commit(), Some(&oid()));
        assert_eq!(not_committed.commit(), None);
        assert!(!not_committed.is_success());
    }

    #[test]
    fn report_serializes_flat() {
        let report = TransactionReport {
            outcome: PublishOutcome::CommittedNotPushed {
                commit: oid(),
                branch: Some(BranchName::new("automation-k3x").unwrap()),
                stage: TransactionStage::Push,
                reason: "connection refused".into(),
            },
            restore_error: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["outcome"], "committed_not_pushed");
        assert_eq!(value["stage"], "push");
        assert_eq!(value["branch"], "automation-k3x");
        assert!(value.get("restore_error").is_none());
    }

    #[test]
    fn message_embeds_topic_verbatim() {
        let path = RepoPath::new("zones/example.org.json").unwrap();
        assert_eq!(
            commit_message("dns: A record", &path),
            "chore(update): dns: A record zones/example.org.json"
        );
    }
}
