//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves settings from the config file and flags
//! 2. Calls the engine to do the work
//! 3. Formats and displays output
//!
//! Handlers return the process exit status; errors carry their own status
//! through [`crate::cli::exit_code`].

mod completion;
mod config_cmd;
mod ensure;
mod publish;

pub use completion::completion;
pub use config_cmd::config;
pub use ensure::ensure;
pub use publish::{publish, ContentSource};

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use super::args::{Command, RemoteArgs};
use super::Context;
use crate::core::config::{Config, Settings};
use crate::engine::PublishError;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<i32> {
    match command {
        Command::Ensure { remote, format } => ensure::ensure(ctx, &remote, format),
        Command::Publish {
            remote,
            path,
            topic,
            json,
            file,
            format,
        } => {
            let source = ContentSource::from_args(json, file);
            publish::publish(ctx, &remote, &path, &topic, source, format)
        }
        Command::Config { remote } => config_cmd::config(ctx, &remote),
        Command::Completion { shell } => completion::completion(shell).map(|()| 0),
    }
}

/// Load the config file and apply command-line overrides.
pub(crate) fn load_settings(
    ctx: &Context,
    remote: &RemoteArgs,
) -> Result<(Settings, Option<PathBuf>)> {
    let overrides = remote.to_overrides()?;
    let loaded = Config::load(ctx.config.as_deref())
        .map_err(PublishError::from)
        .context("Failed to load configuration")?;
    if let Some(path) = &loaded.path {
        tracing::debug!(path = %path.display(), "using config file");
    }
    let settings = loaded
        .config
        .settings(&overrides)
        .map_err(PublishError::from)
        .context("Failed to resolve settings")?;
    Ok((settings, loaded.path))
}
