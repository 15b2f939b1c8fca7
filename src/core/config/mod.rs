//! core::config
//!
//! Configuration schema, loading and resolution.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Configuration file
//! 3. Command-line flags ([`Overrides`])
//!
//! # File Locations
//!
//! The first existing file wins:
//! 1. An explicit path (`--config`)
//! 2. `$HANDOFF_CONFIG`
//! 3. `$XDG_CONFIG_HOME/handoff/config.toml`
//! 4. `~/.handoff/config.toml`
//!
//! No file at all is fine; every value can come from flags.
//!
//! # Example
//!
//! ```no_run
//! use handoff::core::config::{Config, Overrides};
//!
//! let loaded = Config::load(None).unwrap();
//! let settings = loaded.config.settings(&Overrides::default()).unwrap();
//! println!("mirroring {} ({})", settings.remote, settings.branch);
//! ```

pub mod schema;

pub use schema::ConfigFile;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::naming::{
    BranchNameGenerator, DEFAULT_MAX_ATTEMPTS, DEFAULT_PREFIX, DEFAULT_SUFFIX_LEN,
};
use crate::core::paths::MirrorPaths;
use crate::core::types::{BranchName, RemoteUrl};

/// Default SSH user for key-pair authentication.
pub const DEFAULT_SSH_USER: &str = "git";

/// Default automation identity name.
pub const DEFAULT_IDENTITY_NAME: &str = "Automation Bot";

/// Default automation identity email.
pub const DEFAULT_IDENTITY_EMAIL: &str = "automation@bln.space";

/// Default directory for mirrors.
pub const DEFAULT_WORK_ROOT: &str = "/var/tmp";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "HANDOFF_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("missing required setting: {0}")]
    MissingValue(&'static str),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Values supplied on the command line.
#[derive(Clone, Default)]
pub struct Overrides {
    pub remote_url: Option<String>,
    pub branch: Option<String>,
    pub ssh_user: Option<String>,
    pub public_key: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub work_root: Option<PathBuf>,
}

impl std::fmt::Debug for Overrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overrides")
            .field("remote_url", &self.remote_url)
            .field("branch", &self.branch)
            .field("ssh_user", &self.ssh_user)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("work_root", &self.work_root)
            .finish()
    }
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Where it was loaded from, if anywhere.
    pub path: Option<PathBuf>,
}

/// Configuration as read from disk.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
}

/// The automation identity used as commit author and committer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: DEFAULT_IDENTITY_NAME.to_string(),
            email: DEFAULT_IDENTITY_EMAIL.to_string(),
        }
    }
}

/// Key material locations for the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub username: String,
    pub public_key: PathBuf,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for SshSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSettings")
            .field("username", &self.username)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fully resolved settings for one mirror.
///
/// Everything an operation needs is carried here; nothing is looked up
/// from the environment after resolution.
#[derive(Debug, Clone)]
pub struct Settings {
    pub remote: RemoteUrl,
    pub branch: BranchName,
    pub ssh: SshSettings,
    pub identity: Identity,
    pub work_root: PathBuf,
    pub naming: BranchNameGenerator,
}

impl Settings {
    /// Storage locations for this mirror.
    pub fn paths(&self) -> MirrorPaths {
        MirrorPaths::for_remote(&self.work_root, &self.remote)
    }

    /// Render as a config file with the passphrase redacted.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let file = ConfigFile {
            remote: Some(schema::RemoteSection {
                url: Some(self.remote.to_string()),
                branch: Some(self.branch.to_string()),
            }),
            ssh: Some(schema::SshSection {
                username: Some(self.ssh.username.clone()),
                public_key: Some(self.ssh.public_key.clone()),
                private_key: Some(self.ssh.private_key.clone()),
                passphrase: self.ssh.passphrase.as_ref().map(|_| "<redacted>".to_string()),
            }),
            identity: Some(schema::IdentitySection {
                name: Some(self.identity.name.clone()),
                email: Some(self.identity.email.clone()),
            }),
            mirror: Some(schema::MirrorSection {
                work_root: Some(self.work_root.clone()),
            }),
            naming: Some(schema::NamingSection {
                prefix: Some(self.naming.prefix().to_string()),
                suffix_len: Some(self.naming.suffix_len()),
                max_attempts: Some(self.naming.max_attempts()),
            }),
        };
        toml::to_string_pretty(&file).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or if a file
    /// exists but cannot be read, parsed or validated.
    pub fn load(explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let path = match explicit {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        let file = match &path {
            Some(path) => Self::read_file(path)?,
            None => ConfigFile::default(),
        };
        file.validate()?;

        if let Some(path) = &path {
            tracing::debug!(path = %path.display(), "loaded configuration");
        }

        Ok(ConfigLoadResult {
            config: Config { file },
            path,
        })
    }

    /// Search the default locations for a config file.
    fn discover() -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("handoff/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".handoff/config.toml"));
        }
        candidates.into_iter().find(|p| p.exists())
    }

    /// Read and parse a config file.
    pub fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve file values and overrides into [`Settings`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingValue`] when the remote, branch or key paths
    ///   are not given anywhere
    /// - [`ConfigError::InvalidValue`] when a value fails validation
    pub fn settings(&self, overrides: &Overrides) -> Result<Settings, ConfigError> {
        let remote = self.file.remote.clone().unwrap_or_default();
        let ssh = self.file.ssh.clone().unwrap_or_default();
        let identity = self.file.identity.clone().unwrap_or_default();
        let mirror = self.file.mirror.clone().unwrap_or_default();
        let naming = self.file.naming.clone().unwrap_or_default();

        let username = overrides
            .ssh_user
            .clone()
            .or(ssh.username)
            .unwrap_or_else(|| DEFAULT_SSH_USER.to_string());

        let url = overrides
            .remote_url
            .clone()
            .or(remote.url)
            .ok_or(ConfigError::MissingValue("remote.url"))?;
        let remote_url = RemoteUrl::new(&url, &username)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let branch = overrides
            .branch
            .clone()
            .or(remote.branch)
            .ok_or(ConfigError::MissingValue("remote.branch"))?;
        let branch =
            BranchName::new(branch).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let public_key = overrides
            .public_key
            .clone()
            .or(ssh.public_key)
            .ok_or(ConfigError::MissingValue("ssh.public_key"))?;
        let private_key = overrides
            .private_key
            .clone()
            .or(ssh.private_key)
            .ok_or(ConfigError::MissingValue("ssh.private_key"))?;
        let passphrase = overrides.passphrase.clone().or(ssh.passphrase);

        let defaults = Identity::default();
        let identity = Identity {
            name: identity.name.unwrap_or(defaults.name),
            email: identity.email.unwrap_or(defaults.email),
        };

        let work_root = overrides
            .work_root
            .clone()
            .or(mirror.work_root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_ROOT));

        let naming = BranchNameGenerator::new(
            naming.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            naming.suffix_len.unwrap_or(DEFAULT_SUFFIX_LEN),
            naming.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        )
        .map_err(|e| ConfigError::InvalidValue(format!("naming: {}", e)))?;

        Ok(Settings {
            remote: remote_url,
            branch,
            ssh: SshSettings {
                username,
                public_key,
                private_key,
                passphrase,
            },
            identity,
            work_root,
            naming,
        })
    }
}
