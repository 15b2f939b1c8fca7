//! engine
//!
//! Orchestrates a run: Lock -> Ensure -> Write -> Publish -> Restore.
//!
//! # Architecture
//!
//! The engine wires the components together for one mirror:
//!
//! 1. **Lock**: take the exclusive [`MirrorLock`] for the mirror
//! 2. **Ensure**: clone or refresh via [`RepositoryMirror`]
//! 3. **Write**: place content through [`ContentWriter`]
//! 4. **Publish**: run the [`PublishTransaction`] hand-off
//!
//! The lock is held from ensure until the last transaction of a
//! [`Session`] has finished, including its restore step.
//!
//! # Errors
//!
//! Anything that stops a run before the transaction starts is a
//! [`PublishError`]. Problems inside the transaction are reported through
//! [`TransactionReport`] instead, so a caller can tell "nothing happened"
//! from "committed but not pushed".
//!
//! # Example
//!
//! ```ignore
//! use handoff::engine::Publisher;
//!
//! let publisher = Publisher::new(settings)?;
//! let report = publisher.publish(&serde_json::json!({"a": 1}), "bla/fritzbox.json", "dyndns update")?;
//! std::process::exit(report.outcome.exit_code());
//! ```

pub mod error;
pub mod mirror;
pub mod publish;
pub mod writer;

pub use error::PublishError;
pub use mirror::{MirrorError, MirrorState, RepositoryMirror};
pub use publish::{PublishOutcome, PublishTransaction, TransactionReport, TransactionStage};
pub use writer::{ContentWriter, WriteError};

use serde::Serialize;

use crate::core::config::Settings;
use crate::core::ops::lock::MirrorLock;
use crate::core::types::RepoPath;
use crate::credentials::{Credential, CredentialProvider};
use crate::git::Git;

/// Entry point for ensure and publish runs against one mirror.
#[derive(Debug)]
pub struct Publisher {
    settings: Settings,
    credential: Credential,
    mirror: RepositoryMirror,
}

impl Publisher {
    /// Resolve credentials and prepare the mirror handle.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Configuration`] if a key file is missing
    pub fn new(settings: Settings) -> Result<Self, PublishError> {
        let credential = CredentialProvider::from_settings(&settings.ssh)?;
        Ok(Self::with_credential(settings, credential))
    }

    /// Use an already resolved credential.
    pub fn with_credential(settings: Settings, credential: Credential) -> Self {
        let mirror = RepositoryMirror::from_settings(&settings);
        Self {
            settings,
            credential,
            mirror,
        }
    }

    /// The settings this publisher was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The mirror handle.
    pub fn mirror(&self) -> &RepositoryMirror {
        &self.mirror
    }

    /// Clone or refresh the mirror under the lock.
    pub fn ensure(&self) -> Result<MirrorState, PublishError> {
        let session = self.open_session()?;
        Ok(session.state)
    }

    /// Lock and ensure the mirror, keeping both for further transactions.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Busy`] if another process holds the lock
    /// - [`PublishError::Corruption`] if the mirror had to be removed
    /// - [`PublishError::Remote`] if clone or fetch failed
    pub fn open_session(&self) -> Result<Session<'_>, PublishError> {
        let lock = MirrorLock::acquire(self.mirror.paths())?;
        let (git, state) = self.mirror.ensure(&self.credential)?;
        Ok(Session {
            publisher: self,
            git,
            state,
            _lock: lock,
        })
    }

    /// Ensure, write `content` at `path`, then commit and publish it.
    pub fn publish<T: Serialize + ?Sized>(
        &self,
        content: &T,
        path: &str,
        topic: &str,
    ) -> Result<TransactionReport, PublishError> {
        let path = RepoPath::new(path).map_err(WriteError::from)?;
        let session = self.open_session()?;
        session.publish(content, &path, topic)
    }
}

/// A locked, ensured mirror.
///
/// Transactions in one session are not separated by a refresh, so each one
/// stacks a commit on top of the previous one on the local protected
/// branch. The lock is released when the session is dropped.
#[derive(Debug)]
pub struct Session<'a> {
    publisher: &'a Publisher,
    git: Git,
    state: MirrorState,
    _lock: MirrorLock,
}

impl Session<'_> {
    /// State reported by the ensure that opened this session.
    pub fn state(&self) -> &MirrorState {
        &self.state
    }

    /// Git access to the mirror.
    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Writer rooted at the mirror's working tree.
    pub fn writer(&self) -> Result<ContentWriter, PublishError> {
        Ok(ContentWriter::new(self.git.workdir()?))
    }

    /// Write `content` at `path`, then commit and publish it.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Write`] if the content cannot be written; nothing
    ///   has been staged in that case
    pub fn publish<T: Serialize + ?Sized>(
        &self,
        content: &T,
        path: &RepoPath,
        topic: &str,
    ) -> Result<TransactionReport, PublishError> {
        self.writer()?.write(content, path)?;
        Ok(self.transaction().commit_and_publish(topic, path))
    }

    fn transaction(&self) -> PublishTransaction<'_> {
        let settings = &self.publisher.settings;
        PublishTransaction::new(
            &self.git,
            &settings.branch,
            &settings.identity,
            &settings.naming,
            &self.publisher.credential,
        )
    }
}
