//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <file>`: Read settings from this file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Errors only

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};

use crate::core::config::Overrides;
use crate::ui::output::Format;

/// handoff - Publish generated content to a protected repository through
/// ephemeral branches
#[derive(Parser, Debug)]
#[command(name = "handoff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: $HANDOFF_CONFIG, then the XDG and home locations)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Settings that override the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Remote repository (`host/owner/repo`, URL, or local path)
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Protected branch to track
    #[arg(long)]
    pub branch: Option<String>,

    /// SSH user (default: git, or the user in the remote URL)
    #[arg(long, value_name = "USER")]
    pub ssh_user: Option<String>,

    /// Public key file
    #[arg(long, value_name = "FILE")]
    pub public_key: Option<PathBuf>,

    /// Private key file
    #[arg(long, value_name = "FILE")]
    pub private_key: Option<PathBuf>,

    /// Private key passphrase
    #[arg(long, env = "HANDOFF_SSH_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Prompt for the private key passphrase (wins over --passphrase)
    #[arg(long)]
    pub ask_passphrase: bool,

    /// Directory holding mirrors and lock files
    #[arg(long, value_name = "DIR")]
    pub work_root: Option<PathBuf>,
}

impl RemoteArgs {
    /// Convert to config overrides, prompting for a passphrase if asked.
    pub fn to_overrides(&self) -> Result<Overrides> {
        let passphrase = if self.ask_passphrase {
            Some(
                rpassword::prompt_password("SSH key passphrase: ")
                    .context("Failed to read passphrase")?,
            )
        } else {
            self.passphrase.clone()
        };

        Ok(Overrides {
            remote_url: self.remote_url.clone(),
            branch: self.branch.clone(),
            ssh_user: self.ssh_user.clone(),
            public_key: self.public_key.clone(),
            private_key: self.private_key.clone(),
            passphrase,
            work_root: self.work_root.clone(),
        })
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone or refresh the local mirror
    #[command(
        name = "ensure",
        long_about = "Clone or refresh the local mirror.\n\n\
            Clones the remote into <work-root>/<repo>.git if it is missing. Otherwise \
            fetches the protected branch from origin and hard-resets the mirror to it, \
            discarding any local drift. A mirror that cannot be opened is removed and \
            the command exits with status 75.",
        after_help = "\
EXAMPLES:
    handoff ensure --remote-url github.com/org/config --branch main \\
        --public-key ~/.ssh/id.pub --private-key ~/.ssh/id"
    )]
    Ensure {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Result format
        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },

    /// Write JSON content and publish it on a fresh branch
    #[command(
        name = "publish",
        long_about = "Write JSON content into the mirror and publish it.\n\n\
            Ensures the mirror, writes the content at PATH, commits it as the \
            automation identity on the protected branch, and pushes that commit to \
            origin under a fresh automation-xxx branch. The remote's protected branch \
            is never touched.\n\n\
            Exit status: 0 published, 3 committed but not pushed, \
            4 nothing committed.",
        after_help = "\
EXAMPLES:
    handoff publish --path bla/fritzbox.json --topic 'dyndns update' --json '{\"a\":1}'
    some-job | handoff publish --path snapshots/db.json --topic snapshot"
    )]
    Publish {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Destination, relative to the repository root
        #[arg(long)]
        path: String,

        /// Label embedded in the commit message
        #[arg(long)]
        topic: String,

        /// Content as a JSON document
        #[arg(long, value_name = "JSON", conflicts_with = "file")]
        json: Option<String>,

        /// Read the JSON content from this file (stdin when neither is given)
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Result format
        #[arg(long, value_enum, default_value_t)]
        format: Format,
    },

    /// Print the resolved configuration
    #[command(name = "config")]
    Config {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    handoff completion bash >> ~/.bashrc
    handoff completion fish > ~/.config/fish/completions/handoff.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
