//! cli
//!
//! Command-line interface layer for handoff.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve settings and delegate to command handlers
//! - Map failures to process exit statuses
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`] for execution. It never calls `process::exit` itself;
//! [`run`] returns the status for `main` to use.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::Result;

use crate::core::config::ConfigError;
use crate::engine::error::{PublishError, EXIT_CONFIG, EXIT_FAILURE};
use crate::ui::output::Verbosity;

/// Execution context derived from global flags.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit configuration file.
    pub config: Option<PathBuf>,
    /// Output verbosity.
    pub verbosity: Verbosity,
}

/// Run a parsed command line, returning the exit status on success.
///
/// Commands that complete but report a partial outcome (for example a
/// commit that could not be pushed) return a non-zero status through `Ok`.
pub fn run(cli: Cli) -> Result<i32> {
    let ctx = Context {
        config: cli.config.clone(),
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
    };

    commands::dispatch(cli.command, &ctx)
}

/// Exit status for an error returned by [`run`].
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(err) = err.downcast_ref::<PublishError>() {
        return err.exit_code();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return EXIT_CONFIG;
    }
    EXIT_FAILURE
}
