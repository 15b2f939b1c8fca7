//! core::types
//!
//! Strong types for the values that cross module boundaries.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//! - [`RepoPath`] - Relative path that stays inside a working tree
//! - [`RemoteUrl`] - Normalized address of the remote repository
//! - [`Fingerprint`] - Hash of working tree contents
//!
//! # Validation
//!
//! These types enforce validity at construction time. A `RepoPath` that
//! exists is known not to climb out of the repository root, a `BranchName`
//! is known to be acceptable to Git, and so on.
//!
//! # Examples
//!
//! ```
//! use handoff::core::types::{BranchName, RefName, RepoPath};
//!
//! let branch = BranchName::new("main").unwrap();
//! assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/main");
//!
//! assert!(RepoPath::new("bla/fritzbox.json").is_ok());
//! assert!(RepoPath::new("../outside.json").is_err());
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("invalid repository path: {0}")]
    InvalidPath(String),

    #[error("invalid remote url: {0}")]
    InvalidRemote(String),
}

/// Characters Git refuses anywhere in a ref name.
const FORBIDDEN_REF_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

/// Check a name against `git check-ref-format` rules shared by branches and refs.
///
/// Returns a human-readable reason on failure.
fn refname_violation(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("cannot be empty".into());
    }
    if name == "@" {
        return Some("cannot be '@'".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Some("cannot start or end with '/'".into());
    }
    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Some(format!("cannot contain '{bad}'"));
        }
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_REF_CHARS.contains(c)) {
        return Some(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Some("cannot contain control characters".into());
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            return Some("component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Some("component cannot end with '.lock'".into());
        }
    }
    None
}

/// A validated Git branch name (short form, without `refs/heads/`).
///
/// # Example
///
/// ```
/// use handoff::core::types::BranchName;
///
/// let name = BranchName::new("automation-x7q").unwrap();
/// assert_eq!(name.as_str(), "automation-x7q");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-leading-dash").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        if let Some(reason) = refname_violation(&name) {
            return Err(TypeError::InvalidBranchName(format!("{name:?} {reason}")));
        }
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// # Example
///
/// ```
/// use handoff::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not 40 or 64 hex characters.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid("object id must be hexadecimal".into()));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated, fully qualified Git reference name.
///
/// # Example
///
/// ```
/// use handoff::core::types::{BranchName, RefName};
///
/// let main = BranchName::new("main").unwrap();
/// assert_eq!(RefName::for_branch(&main).as_str(), "refs/heads/main");
/// assert_eq!(
///     RefName::for_remote_branch("origin", &main).as_str(),
///     "refs/remotes/origin/main"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(reason) = refname_violation(&name) {
            return Err(TypeError::InvalidRefName(format!("{name:?} {reason}")));
        }
        Ok(Self(name))
    }

    /// Ref for a local branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Remote-tracking ref for a branch (`refs/remotes/<remote>/<branch>`).
    ///
    /// Remote names are plain identifiers (`origin`), so the result is valid
    /// whenever the branch is.
    pub fn for_remote_branch(remote: &str, branch: &BranchName) -> Self {
        Self(format!("refs/remotes/{}/{}", remote, branch.as_str()))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A POSIX-style path relative to the repository root.
///
/// Construction rejects anything that could resolve outside the working
/// tree or into Git's own storage:
/// - empty paths and paths that are only `.`
/// - absolute paths
/// - `..` components
/// - a first component of `.git`
///
/// Redundant `.` components and repeated slashes are normalized away.
///
/// # Example
///
/// ```
/// use handoff::core::types::RepoPath;
///
/// let path = RepoPath::new("./bla//fritzbox.json").unwrap();
/// assert_eq!(path.as_str(), "bla/fritzbox.json");
/// assert_eq!(path.parent(), Some("bla"));
///
/// assert!(RepoPath::new("/etc/passwd").is_err());
/// assert!(RepoPath::new(".git/config").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Create a validated repository path.
    pub fn new(path: impl AsRef<str>) -> Result<Self, TypeError> {
        let raw = path.as_ref();
        if raw.contains('\0') {
            return Err(TypeError::InvalidPath("path contains a NUL byte".into()));
        }
        if raw.starts_with('/') || Path::new(raw).is_absolute() {
            return Err(TypeError::InvalidPath(format!("{raw:?} is absolute")));
        }

        let mut parts: Vec<&str> = Vec::new();
        for component in raw.split('/') {
            match component {
                "" | "." => continue,
                ".." => {
                    return Err(TypeError::InvalidPath(format!(
                        "{raw:?} escapes the repository root"
                    )))
                }
                other => parts.push(other),
            }
        }

        if parts.is_empty() {
            return Err(TypeError::InvalidPath(format!("{raw:?} names no file")));
        }
        if parts.iter().any(|p| p.eq_ignore_ascii_case(".git")) {
            return Err(TypeError::InvalidPath(format!(
                "{raw:?} points into a .git directory"
            )));
        }
        Ok(Self(parts.join("/")))
    }

    /// Get the normalized path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent directory, if the path has one.
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(dir, _)| dir)
    }

    /// Resolve against a working tree root.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, c| acc.join(c))
    }
}

impl TryFrom<String> for RepoPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of the remote repository.
///
/// A bare `host/owner/repo` is turned into an SSH URL for the given user,
/// everything else (URLs with a scheme, scp-style `user@host:path`, local
/// paths) is kept as written.
///
/// # Example
///
/// ```
/// use handoff::core::types::RemoteUrl;
///
/// let url = RemoteUrl::new("github.com/gutmensch/argocd", "git").unwrap();
/// assert_eq!(url.as_str(), "ssh://git@github.com/gutmensch/argocd");
/// assert_eq!(url.repo_name(), "argocd");
///
/// let scp = RemoteUrl::new("git@example.org:team/site.git", "git").unwrap();
/// assert_eq!(scp.as_str(), "git@example.org:team/site.git");
/// assert_eq!(scp.repo_name(), "site");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteUrl(String);

impl RemoteUrl {
    /// Normalize a configured remote address.
    pub fn new(raw: &str, ssh_user: &str) -> Result<Self, TypeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TypeError::InvalidRemote("remote url cannot be empty".into()));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_ascii_control()) {
            return Err(TypeError::InvalidRemote(format!(
                "{raw:?} contains whitespace or control characters"
            )));
        }

        let verbatim = raw.contains("://")
            || Path::new(raw).is_absolute()
            || raw.starts_with('.')
            || Self::is_scp_like(raw);

        let url = if verbatim {
            raw.to_string()
        } else {
            format!("ssh://{}@{}", ssh_user, raw)
        };

        let parsed = Self(url);
        if parsed.repo_name().is_empty() {
            return Err(TypeError::InvalidRemote(format!(
                "{raw:?} does not name a repository"
            )));
        }
        Ok(parsed)
    }

    /// `user@host:path` without a scheme.
    fn is_scp_like(raw: &str) -> bool {
        match raw.split_once(':') {
            Some((head, _)) => head.contains('@') && !head.contains('/'),
            None => false,
        }
    }

    /// Final path segment with any `.git` suffix removed.
    pub fn repo_name(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        let last = trimmed
            .rsplit(|c: char| c == '/' || c == ':')
            .next()
            .unwrap_or(trimmed);
        last.strip_suffix(".git").unwrap_or(last)
    }

    /// Whether `other` addresses the same repository.
    ///
    /// Scheme, ssh user, trailing slashes, a `.git` suffix and the case of
    /// the host are ignored, so `git@host:org/repo.git` matches
    /// `ssh://deploy@host/org/repo/`.
    ///
    /// ```
    /// use handoff::core::types::RemoteUrl;
    ///
    /// let url = RemoteUrl::new("github.com/org/config", "git").unwrap();
    /// assert!(url.same_repository("git@GitHub.com:org/config.git"));
    /// assert!(!url.same_repository("ssh://git@github.com/org/other"));
    /// ```
    pub fn same_repository(&self, other: &str) -> bool {
        Self::location(&self.0) == Self::location(other.trim())
    }

    /// Host and path of a URL with everything cosmetic stripped.
    fn location(url: &str) -> String {
        let (host, path) = if let Some((_, rest)) = url.split_once("://") {
            match rest.split_once('/') {
                Some((authority, path)) => (authority, path),
                None => (rest, ""),
            }
        } else if Self::is_scp_like(url) {
            url.split_once(':').unwrap_or((url, ""))
        } else {
            ("", url)
        };

        let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let path = path.trim_end_matches('/');
        if host.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", host.to_ascii_lowercase(), path.trim_start_matches('/'))
        }
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stable hash over the files of a working tree.
///
/// Two trees with the same relative paths and byte contents produce the
/// same fingerprint. The `.git` directory is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash every regular file below `root` in sorted path order.
    pub fn of_worktree(root: &Path) -> io::Result<Self> {
        let mut files = Vec::new();
        collect_files(root, root, &mut files)?;
        files.sort();

        let mut hasher = Sha256::new();
        for relative in files {
            let bytes = fs::read(root.join(&relative))?;
            hasher.update(relative.as_bytes());
            hasher.update(b"\0");
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if dir == root && entry.file_name() == ".git" {
            continue;
        }

        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            out.push(relative);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            assert!(BranchName::new("main").is_ok());
            assert!(BranchName::new("automation-abc").is_ok());
            assert!(BranchName::new("release/2024.1").is_ok());
        }

        #[test]
        fn invalid_branch_names() {
            for bad in ["", "@", ".hidden", "-x", "a..b", "a//b", "x.lock", "a b", "a:b", "a/"] {
                assert!(BranchName::new(bad).is_err(), "{bad:?} should be rejected");
            }
        }

        #[test]
        fn serde_roundtrip_validates() {
            let err = serde_json::from_str::<BranchName>("\"bad name\"");
            assert!(err.is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn normalizes_case() {
            let oid = Oid::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
            assert_eq!(oid.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        }

        #[test]
        fn rejects_wrong_length_and_non_hex() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn short_clamps() {
            let oid = Oid::new("a".repeat(40)).unwrap();
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod repo_path {
        use super::*;

        #[test]
        fn normalizes_dot_and_slashes() {
            assert_eq!(RepoPath::new("a/./b//c.json").unwrap().as_str(), "a/b/c.json");
        }

        #[test]
        fn rejects_escapes() {
            assert!(RepoPath::new("../x").is_err());
            assert!(RepoPath::new("a/../../x").is_err());
            assert!(RepoPath::new("/abs").is_err());
            assert!(RepoPath::new("").is_err());
            assert!(RepoPath::new("./").is_err());
            assert!(RepoPath::new(".git/HEAD").is_err());
            assert!(RepoPath::new(".GIT/HEAD").is_err());
        }

        #[test]
        fn git_lookalike_names_are_allowed() {
            assert!(RepoPath::new("docs/.gitkeep").is_ok());
            assert!(RepoPath::new(".github/workflows/ci.json").is_ok());
            assert!(RepoPath::new("vendor/sub.git/x.json").is_ok());
        }

        #[test]
        fn git_directory_rejected_at_any_depth() {
            assert!(RepoPath::new("vendor/sub/.git/config").is_err());
            assert!(RepoPath::new("a/.GIT/hooks/pre-commit").is_err());
            assert!(RepoPath::new("./x/./.git").is_err());
        }

        #[test]
        fn parent_of_top_level_file_is_none() {
            assert_eq!(RepoPath::new("a.json").unwrap().parent(), None);
        }

        #[test]
        fn to_path_joins_components() {
            let p = RepoPath::new("a/b.json").unwrap();
            assert_eq!(p.to_path(Path::new("/root")), PathBuf::from("/root/a/b.json"));
        }
    }

    mod remote_url {
        use super::*;

        #[test]
        fn bare_host_path_becomes_ssh() {
            let url = RemoteUrl::new("github.com/org/repo", "deploy").unwrap();
            assert_eq!(url.as_str(), "ssh://deploy@github.com/org/repo");
        }

        #[test]
        fn scheme_and_local_paths_are_verbatim() {
            let https = RemoteUrl::new("https://example.org/a/b.git", "git").unwrap();
            assert_eq!(https.as_str(), "https://example.org/a/b.git");
            assert_eq!(https.repo_name(), "b");

            let local = RemoteUrl::new("/srv/git/config.git", "git").unwrap();
            assert_eq!(local.as_str(), "/srv/git/config.git");
            assert_eq!(local.repo_name(), "config");
        }

        #[test]
        fn rejects_empty_and_whitespace() {
            assert!(RemoteUrl::new("", "git").is_err());
            assert!(RemoteUrl::new("github.com/a b", "git").is_err());
        }

        #[test]
        fn trailing_slash_ignored_for_name() {
            let url = RemoteUrl::new("ssh://git@host/org/repo/", "git").unwrap();
            assert_eq!(url.repo_name(), "repo");
        }

        #[test]
        fn same_repository_ignores_user_and_suffix() {
            let url = RemoteUrl::new("github.com/org/repo", "git").unwrap();
            assert!(url.same_repository("ssh://git@github.com/org/repo"));
            assert!(url.same_repository("ssh://deploy@github.com/org/repo/"));
            assert!(url.same_repository("deploy@github.com:org/repo.git"));
            assert!(!url.same_repository("ssh://git@gitlab.com/org/repo"));
            assert!(!url.same_repository("ssh://git@github.com/org/repo2"));
        }

        #[test]
        fn same_repository_for_local_paths() {
            let url = RemoteUrl::new("/srv/git/config.git", "git").unwrap();
            assert!(url.same_repository("/srv/git/config.git/"));
            assert!(url.same_repository("/srv/git/config"));
            assert!(!url.same_repository("/srv/other/config.git"));
        }
    }

    mod fingerprint {
        use super::*;
        use tempfile::TempDir;

        #[test]
        fn equal_trees_hash_equal() {
            let a = TempDir::new().unwrap();
            let b = TempDir::new().unwrap();
            for dir in [a.path(), b.path()] {
                fs::create_dir_all(dir.join("x")).unwrap();
                fs::write(dir.join("x/y.json"), "{}").unwrap();
                fs::write(dir.join("README"), "hi").unwrap();
            }
            fs::create_dir_all(b.path().join(".git")).unwrap();
            fs::write(b.path().join(".git/HEAD"), "ignored").unwrap();

            assert_eq!(
                Fingerprint::of_worktree(a.path()).unwrap(),
                Fingerprint::of_worktree(b.path()).unwrap()
            );
        }

        #[test]
        fn content_change_changes_hash() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("f"), "1").unwrap();
            let before = Fingerprint::of_worktree(dir.path()).unwrap();
            fs::write(dir.path().join("f"), "2").unwrap();
            let after = Fingerprint::of_worktree(dir.path()).unwrap();
            assert_ne!(before, after);
        }
    }
}
