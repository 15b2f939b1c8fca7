//! publish command - Write JSON content and hand it off on a fresh branch

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde_json::Value;

use super::load_settings;
use crate::cli::args::RemoteArgs;
use crate::cli::Context;
use crate::engine::{PublishOutcome, Publisher};
use crate::ui::output::{self, Format};

/// Where the content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// Inline JSON text.
    Inline(String),
    /// A file holding JSON text.
    File(PathBuf),
    /// Standard input.
    Stdin,
}

impl ContentSource {
    /// Pick the source from the `--json` and `--file` flags.
    pub fn from_args(json: Option<String>, file: Option<PathBuf>) -> Self {
        match (json, file) {
            (Some(text), _) => ContentSource::Inline(text),
            (None, Some(path)) => ContentSource::File(path),
            (None, None) => ContentSource::Stdin,
        }
    }

    /// Read and parse the content.
    pub fn load(&self) -> Result<Value> {
        let text = match self {
            ContentSource::Inline(text) => text.clone(),
            ContentSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            ContentSource::Stdin => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                buf
            }
        };
        serde_json::from_str(&text).context("Content is not valid JSON")
    }
}

/// Write content at `path` and publish it.
pub fn publish(
    ctx: &Context,
    remote: &RemoteArgs,
    path: &str,
    topic: &str,
    source: ContentSource,
    format: Format,
) -> Result<i32> {
    let content = source.load()?;
    let (settings, _) = load_settings(ctx, remote)?;
    let publisher = Publisher::new(settings)?;

    let report = publisher
        .publish(&content, path, topic)
        .with_context(|| format!("Failed to publish {}", path))?;

    if format == Format::Json {
        output::json(&report)?;
    } else {
        match &report.outcome {
            PublishOutcome::Published { commit, branch } => output::success(
                format!("Published {} as {} ({})", path, branch, commit.short(12)),
                ctx.verbosity,
            ),
            PublishOutcome::CommittedNotPushed {
                commit,
                stage,
                reason,
                ..
            } => output::error(format!(
                "committed {} locally but {} failed: {}",
                commit.short(12),
                stage,
                reason
            )),
            PublishOutcome::NotCommitted { stage, reason } => {
                output::error(format!("nothing committed, {} failed: {}", stage, reason))
            }
        }
    }

    if let Some(restore) = &report.restore_error {
        output::warn(
            format!("mirror left off the protected branch: {}", restore),
            ctx.verbosity,
        );
    }

    Ok(report.outcome.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_selection() {
        assert_eq!(
            ContentSource::from_args(Some("1".into()), None),
            ContentSource::Inline("1".into())
        );
        assert_eq!(
            ContentSource::from_args(None, Some("a.json".into())),
            ContentSource::File("a.json".into())
        );
        assert_eq!(ContentSource::from_args(None, None), ContentSource::Stdin);
    }

    #[test]
    fn inline_content_parsed() {
        let value = ContentSource::Inline(r#"{"a":1}"#.into()).load().unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn invalid_json_rejected() {
        assert!(ContentSource::Inline("{nope".into()).load().is_err());
    }

    #[test]
    fn file_content_parsed() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("c.json");
        std::fs::write(&file, "[1,2]").unwrap();
        let value = ContentSource::File(file).load().unwrap();
        assert_eq!(value, json!([1, 2]));
    }
}
