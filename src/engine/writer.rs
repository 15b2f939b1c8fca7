//! engine::writer
//!
//! Durable placement of JSON content inside the mirror's working tree.
//!
//! # Durability
//!
//! Each write creates missing parent directories (mode `0755`), writes the
//! compact JSON text, flushes and `fsync`s the file, then syncs the parent
//! directory on Unix so the directory entry survives a crash too.
//!
//! # Containment
//!
//! Paths are validated by [`RepoPath`]. Parent directories are walked one
//! component at a time from the canonical root: an existing component is
//! canonicalized and must stay inside the root, and a missing one is only
//! created below a directory that already passed. Nothing is created
//! outside the working tree, even through a symlinked directory. An
//! existing symlink at the target itself is refused.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::core::types::{RepoPath, TypeError};

/// Errors from content writes.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The relative path is not acceptable.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] TypeError),

    /// The resolved location is outside the working tree.
    #[error("path escapes the working tree: {0}")]
    Escape(String),

    /// The content could not be serialized or parsed.
    #[error("content is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> WriteError + '_ {
    move |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes content below a working tree root.
///
/// Never stages or commits.
#[derive(Debug, Clone)]
pub struct ContentWriter {
    root: PathBuf,
}

impl ContentWriter {
    /// Create a writer for the working tree at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serialize `content` as JSON and durably write it at `path`.
    ///
    /// Returns the absolute location written.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use handoff::core::types::RepoPath;
    /// use handoff::engine::writer::ContentWriter;
    ///
    /// let writer = ContentWriter::new("/var/tmp/argocd.git");
    /// let path = RepoPath::new("bla/fritzbox.json").unwrap();
    /// writer.write(&serde_json::json!({"a": 1}), &path).unwrap();
    /// ```
    pub fn write<T: Serialize + ?Sized>(
        &self,
        content: &T,
        path: &RepoPath,
    ) -> Result<PathBuf, WriteError> {
        let bytes = serde_json::to_vec(content)?;
        let (dirs, name) = match path.as_str().rsplit_once('/') {
            Some((dirs, name)) => (Some(dirs), name),
            None => (None, path.as_str()),
        };

        let root = self.root.canonicalize().map_err(io_err(&self.root))?;
        let parent = match dirs {
            Some(dirs) => contained_dir(&root, dirs, path)?,
            None => root,
        };
        let target = parent.join(name);
        if let Ok(meta) = target.symlink_metadata() {
            if meta.file_type().is_symlink() || meta.is_dir() {
                return Err(WriteError::Escape(path.to_string()));
            }
        }

        let mut file = File::create(&target).map_err(io_err(&target))?;
        file.write_all(&bytes).map_err(io_err(&target))?;
        file.flush().map_err(io_err(&target))?;
        file.sync_all().map_err(io_err(&target))?;
        drop(file);

        sync_dir(&parent).map_err(io_err(&parent))?;

        tracing::debug!(path = %path, bytes = bytes.len(), "content written");
        Ok(path.to_path(&self.root))
    }

    /// Read JSON content back from the working tree.
    pub fn read<T: DeserializeOwned>(&self, path: &RepoPath) -> Result<T, WriteError> {
        let target = path.to_path(&self.root);
        let bytes = fs::read(&target).map_err(io_err(&target))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Resolve `dirs` below `root`, creating missing directories as it goes.
///
/// Every existing component is canonicalized and checked against `root`
/// before anything is created beneath it.
fn contained_dir(root: &Path, dirs: &str, path: &RepoPath) -> Result<PathBuf, WriteError> {
    let mut dir = root.to_path_buf();
    for part in dirs.split('/') {
        let next = dir.join(part);
        match next.symlink_metadata() {
            Ok(meta) if meta.is_dir() || meta.file_type().is_symlink() => {
                let resolved = next.canonicalize().map_err(io_err(&next))?;
                if !resolved.starts_with(root) {
                    return Err(WriteError::Escape(path.to_string()));
                }
                dir = resolved;
            }
            Ok(_) => {
                return Err(WriteError::Io {
                    path: next,
                    source: std::io::Error::other("not a directory"),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                create_dir(&next).map_err(io_err(&next))?;
                dir = next;
            }
            Err(e) => return Err(WriteError::Io { path: next, source: e }),
        }
    }
    Ok(dir)
}

#[cfg(unix)]
fn create_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dir(dir: &Path) -> std::io::Result<()> {
    fs::DirBuilder::new().create(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn path(p: &str) -> RepoPath {
        RepoPath::new(p).unwrap()
    }

    #[test]
    fn round_trip() {
        let temp = TempDir::new().unwrap();
        let writer = ContentWriter::new(temp.path());

        writer.write(&json!({"foo": "bar"}), &path("a/b.json")).unwrap();
        let back: Value = writer.read(&path("a/b.json")).unwrap();
        assert_eq!(back, json!({"foo": "bar"}));
    }

    #[test]
    fn compact_serialization() {
        let temp = TempDir::new().unwrap();
        let writer = ContentWriter::new(temp.path());

        let target = writer.write(&json!({"a": 1}), &path("x.json")).unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn overwrites_existing_file() {
        let temp = TempDir::new().unwrap();
        let writer = ContentWriter::new(temp.path());

        writer.write(&json!([1, 2, 3]), &path("x.json")).unwrap();
        writer.write(&json!(null), &path("x.json")).unwrap();
        let back: Value = writer.read(&path("x.json")).unwrap();
        assert_eq!(back, Value::Null);
    }

    #[cfg(unix)]
    #[test]
    fn parent_directories_are_0755() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let writer = ContentWriter::new(temp.path());
        writer.write(&json!(1), &path("deep/er/x.json")).unwrap();

        let mode = fs::metadata(temp.path().join("deep/er"))
            .unwrap()
            .permissions()
            .mode();
        // umask may only clear bits
        assert_eq!(mode & 0o777 & !0o755, 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_escape_rejected() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        let writer = ContentWriter::new(temp.path());
        let err = writer.write(&json!(1), &path("link/x.json")).unwrap_err();
        assert!(matches!(err, WriteError::Escape(_)));
        assert!(!outside.path().join("x.json").exists());
    }

    #[cfg(unix)]
    #[test]
    fn escape_creates_nothing_outside() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        let writer = ContentWriter::new(temp.path());
        let err = writer
            .write(&json!(1), &path("link/made/by/writer/x.json"))
            .unwrap_err();
        assert!(matches!(err, WriteError::Escape(_)));
        assert!(!outside.path().join("made").exists());
        assert_eq!(fs::read_dir(outside.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_root_is_followed() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("alias")).unwrap();

        let writer = ContentWriter::new(temp.path());
        writer.write(&json!(1), &path("alias/sub/x.json")).unwrap();
        assert!(temp.path().join("real/sub/x.json").exists());
    }

    #[test]
    fn file_in_parent_position_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("plain"), "x").unwrap();

        let writer = ContentWriter::new(temp.path());
        let err = writer.write(&json!(1), &path("plain/x.json")).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_target_rejected() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let victim = outside.path().join("victim");
        fs::write(&victim, "keep").unwrap();
        std::os::unix::fs::symlink(&victim, temp.path().join("x.json")).unwrap();

        let writer = ContentWriter::new(temp.path());
        assert!(writer.write(&json!(1), &path("x.json")).is_err());
        assert_eq!(fs::read_to_string(victim).unwrap(), "keep");
    }

    #[test]
    fn directory_target_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        let writer = ContentWriter::new(temp.path());
        assert!(writer.write(&json!(1), &path("dir")).is_err());
    }
}
