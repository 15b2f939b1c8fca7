//! core
//!
//! Core domain types, configuration, and mirror bookkeeping.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RepoPath, RemoteUrl, etc.
//! - [`naming`] - Ephemeral branch name generation
//! - [`config`] - Configuration schema, loading and resolution
//! - [`paths`] - Centralized path routing for mirror storage
//! - [`ops`] - Mirror locking
//!
//! Nothing in here talks to git; see [`crate::git`] for that.

pub mod config;
pub mod naming;
pub mod ops;
pub mod paths;
pub mod types;
