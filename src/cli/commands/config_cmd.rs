//! config command - Print the resolved configuration

use anyhow::Result;

use super::load_settings;
use crate::cli::args::RemoteArgs;
use crate::cli::Context;
use crate::engine::PublishError;

/// Print resolved settings as TOML, passphrase redacted.
///
/// Always printed, even in quiet mode, since it is the command's result.
pub fn config(ctx: &Context, remote: &RemoteArgs) -> Result<i32> {
    let (settings, path) = load_settings(ctx, remote)?;

    match path {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# no config file found; flags and defaults only"),
    }
    print!(
        "{}",
        settings.to_redacted_toml().map_err(PublishError::from)?
    );
    Ok(0)
}
