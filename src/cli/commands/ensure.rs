//! ensure command - Clone or refresh the local mirror

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::load_settings;
use crate::cli::args::RemoteArgs;
use crate::cli::Context;
use crate::engine::Publisher;
use crate::ui::output::{self, Format};

#[derive(Serialize)]
struct EnsureReport<'a> {
    path: String,
    branch: &'a str,
    tip: &'a str,
    fingerprint: &'a str,
    cloned: bool,
}

/// Clone the mirror if missing, otherwise reset it to the remote tip.
pub fn ensure(ctx: &Context, remote: &RemoteArgs, format: Format) -> Result<i32> {
    let (settings, _) = load_settings(ctx, remote)?;
    let publisher = Publisher::new(settings)?;
    let state = publisher.ensure().context("Failed to ensure mirror")?;

    let report = EnsureReport {
        path: publisher.mirror().path().display().to_string(),
        branch: publisher.mirror().branch().as_str(),
        tip: state.tip.as_str(),
        fingerprint: state.fingerprint.as_str(),
        cloned: state.cloned,
    };

    match format {
        Format::Json => output::json(&report)?,
        Format::Text => {
            let action = if state.cloned { "Cloned" } else { "Refreshed" };
            output::success(
                format!("{} {} at {}", action, report.branch, state.tip.short(12)),
                ctx.verbosity,
            );
            output::print(output::field("mirror", &report.path), ctx.verbosity);
            output::print(output::field("fingerprint", report.fingerprint), ctx.verbosity);
        }
    }
    Ok(0)
}
