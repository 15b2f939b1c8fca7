//! core::config::schema
//!
//! Configuration file schema.
//!
//! All fields are optional in the file; required values are checked when
//! the file is resolved into [`Settings`](super::Settings) together with
//! command-line overrides.
//!
//! # Example
//!
//! ```toml
//! [remote]
//! url = "github.com/gutmensch/argocd"
//! branch = "main"
//!
//! [ssh]
//! username = "git"
//! public_key = "/etc/handoff/id_automation.pub"
//! private_key = "/etc/handoff/id_automation"
//! passphrase = "..."
//!
//! [identity]
//! name = "Automation Bot"
//! email = "automation@bln.space"
//!
//! [mirror]
//! work_root = "/var/tmp"
//!
//! [naming]
//! prefix = "automation-"
//! suffix_len = 3
//! max_attempts = 4096
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Remote repository and tracked branch
    pub remote: Option<RemoteSection>,

    /// Key pair used for every transport operation
    pub ssh: Option<SshSection>,

    /// Commit author/committer
    pub identity: Option<IdentitySection>,

    /// Local mirror storage
    pub mirror: Option<MirrorSection>,

    /// Ephemeral branch naming
    pub naming: Option<NamingSection>,
}

impl ConfigFile {
    /// Validate values that are present.
    ///
    /// Missing values are not an error here; they may still come from
    /// the command line.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if let Some(branch) = &remote.branch {
                BranchName::new(branch.as_str()).map_err(|e| {
                    ConfigError::InvalidValue(format!("remote.branch: {}", e))
                })?;
            }
            if matches!(&remote.url, Some(url) if url.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "remote.url cannot be empty".into(),
                ));
            }
        }

        if let Some(identity) = &self.identity {
            identity.validate()?;
        }

        if let Some(naming) = &self.naming {
            if naming.suffix_len == Some(0) {
                return Err(ConfigError::InvalidValue(
                    "naming.suffix_len must be at least 1".into(),
                ));
            }
            if naming.max_attempts == Some(0) {
                return Err(ConfigError::InvalidValue(
                    "naming.max_attempts must be at least 1".into(),
                ));
            }
        }

        if let Some(ssh) = &self.ssh {
            if matches!(&ssh.username, Some(u) if u.is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "ssh.username cannot be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

/// `[remote]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSection {
    /// Remote address (`host/owner/repo`, URL, or local path)
    pub url: Option<String>,

    /// Protected branch the mirror tracks
    pub branch: Option<String>,
}

/// `[ssh]`
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SshSection {
    /// SSH user (default: "git")
    pub username: Option<String>,

    /// Public key file
    pub public_key: Option<PathBuf>,

    /// Private key file
    pub private_key: Option<PathBuf>,

    /// Private key passphrase
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for SshSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSection")
            .field("username", &self.username)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `[identity]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IdentitySection {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl IdentitySection {
    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "identity.name cannot be empty".into(),
            ));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') || email.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue(format!(
                    "identity.email '{}' is not an address",
                    email
                )));
            }
        }
        Ok(())
    }
}

/// `[mirror]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorSection {
    /// Directory that holds mirrors and their lock files
    pub work_root: Option<PathBuf>,
}

/// `[naming]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NamingSection {
    pub prefix: Option<String>,
    pub suffix_len: Option<usize>,
    pub max_attempts: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let text = r#"
            [remote]
            url = "github.com/org/repo"
            branch = "main"

            [ssh]
            public_key = "/k.pub"
            private_key = "/k"
            passphrase = "secret"

            [identity]
            name = "Bot"
            email = "bot@example.org"

            [mirror]
            work_root = "/tmp/mirrors"

            [naming]
            prefix = "auto-"
            suffix_len = 4
        "#;
        let config: ConfigFile = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.remote.unwrap().branch.as_deref(), Some("main"));
        assert_eq!(config.naming.unwrap().suffix_len, Some(4));
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<ConfigFile, _> = toml::from_str("[remote]\nbrnch = \"main\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_branch_rejected() {
        let config = ConfigFile {
            remote: Some(RemoteSection {
                url: Some("h/o/r".into()),
                branch: Some("bad branch".into()),
            }),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn zero_suffix_rejected() {
        let config = ConfigFile {
            naming: Some(NamingSection {
                suffix_len: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_email_rejected() {
        let config = ConfigFile {
            identity: Some(IdentitySection {
                name: Some("Bot".into()),
                email: Some("not-an-address".into()),
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn passphrase_not_in_debug_output() {
        let ssh = SshSection {
            passphrase: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", ssh).contains("hunter2"));
    }
}
