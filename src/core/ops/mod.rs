//! core::ops
//!
//! Mutual exclusion for mirror operations.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive per-mirror lock
//!
//! # Architecture
//!
//! Every mutating entry point acquires the mirror lock before
//! `ensure()` and holds it until the publish transaction has finished or
//! failed. Two processes pointed at the same work root and remote can
//! therefore never interleave fetch, reset, commit and push steps.

pub mod lock;

pub use lock::{LockError, MirrorLock};
