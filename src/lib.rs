//! handoff - Publish generated content into a protected repository
//!
//! Unattended jobs hand over content (dynamic DNS records, configuration
//! snapshots, ...) and handoff commits it into a local mirror of the target
//! repository, then pushes that single commit to the remote under a fresh
//! `automation-xxx` branch. The remote's protected branch is never written;
//! a downstream review or merge process picks the branch up.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Lock -> Ensure -> Write -> Publish orchestration
//! - [`core`] - Domain types, configuration, naming, paths and locking
//! - [`credentials`] - Key-pair credentials for the transport
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! handoff maintains the following invariants:
//!
//! 1. After `ensure`, the mirror's protected branch equals the remote tip
//! 2. Ephemeral branch names never collide with a known branch
//! 3. After a transaction the mirror is back on the protected branch with
//!    no local ephemeral branch
//! 4. A corrupt mirror is removed, never repaired in place
//! 5. At most one process works on a mirror at a time

pub mod cli;
pub mod core;
pub mod credentials;
pub mod engine;
pub mod git;
pub mod ui;
