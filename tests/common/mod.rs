//! Shared fixture for integration suites.
//!
//! Builds a bare "remote" repository seeded with one commit on `main`,
//! a seed working copy used to push further changes into it, a dummy key
//! pair, and a work root for mirrors. All remote traffic uses the local
//! transport, so the key files are never actually read.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use handoff::core::config::{Config, Overrides, Settings};
use handoff::engine::Publisher;

/// A remote, a seed clone of it, and a work root.
pub struct TestRemote {
    dir: TempDir,
}

impl TestRemote {
    /// Create the bare remote and seed it with `README.md` on `main`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let fixture = Self { dir };

        std::fs::create_dir_all(fixture.remote_path()).unwrap();
        run_git(&fixture.remote_path(), &["init", "--bare"]);
        run_git(
            &fixture.remote_path(),
            &["symbolic-ref", "HEAD", "refs/heads/main"],
        );

        let seed = fixture.seed_path();
        std::fs::create_dir_all(&seed).unwrap();
        run_git(&seed, &["init"]);
        run_git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(&seed, &["config", "user.email", "seed@example.com"]);
        run_git(&seed, &["config", "user.name", "Seed User"]);
        run_git(
            &seed,
            &["remote", "add", "origin", fixture.remote_url().as_str()],
        );
        fixture.seed_commit("README.md", "# Config\n", "Initial commit");

        std::fs::write(fixture.public_key(), "ssh-ed25519 AAAA test\n").unwrap();
        std::fs::write(fixture.private_key(), "not a real key\n").unwrap();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The bare repository acting as the remote.
    pub fn remote_path(&self) -> PathBuf {
        self.root().join("upstream/config.git")
    }

    pub fn remote_url(&self) -> String {
        self.remote_path().to_string_lossy().into_owned()
    }

    pub fn seed_path(&self) -> PathBuf {
        self.root().join("seed")
    }

    pub fn work_root(&self) -> PathBuf {
        self.root().join("work")
    }

    /// Where the mirror of this remote lives.
    pub fn mirror_path(&self) -> PathBuf {
        self.work_root().join("config.git")
    }

    pub fn public_key(&self) -> PathBuf {
        self.root().join("id_test.pub")
    }

    pub fn private_key(&self) -> PathBuf {
        self.root().join("id_test")
    }

    /// Commit a file in the seed clone and push it to the remote's `main`.
    pub fn seed_commit(&self, path: &str, content: &str, message: &str) -> String {
        let seed = self.seed_path();
        let file = seed.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, content).unwrap();
        run_git(&seed, &["add", path]);
        run_git(&seed, &["commit", "-m", message]);
        run_git(&seed, &["push", "origin", "main"]);
        git_output(&seed, &["rev-parse", "HEAD"])
    }

    /// Create a branch on the remote pointing at its `main`.
    pub fn remote_branch(&self, name: &str) {
        run_git(&self.remote_path(), &["branch", name, "main"]);
    }

    /// Branch names on the remote.
    pub fn remote_branches(&self) -> Vec<String> {
        git_output(
            &self.remote_path(),
            &["for-each-ref", "--format=%(refname:short)", "refs/heads"],
        )
        .lines()
        .map(str::to_string)
        .collect()
    }

    /// OID a ref resolves to on the remote.
    pub fn remote_rev(&self, rev: &str) -> String {
        git_output(&self.remote_path(), &["rev-parse", rev])
    }

    /// Run git in the remote and return trimmed stdout.
    pub fn remote_git(&self, args: &[&str]) -> String {
        git_output(&self.remote_path(), args)
    }

    /// Run git in the mirror and return trimmed stdout.
    pub fn mirror_git(&self, args: &[&str]) -> String {
        git_output(&self.mirror_path(), args)
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            remote_url: Some(self.remote_url()),
            branch: Some("main".into()),
            public_key: Some(self.public_key()),
            private_key: Some(self.private_key()),
            work_root: Some(self.work_root()),
            ..Default::default()
        }
    }

    pub fn settings(&self) -> Settings {
        Config::default()
            .settings(&self.overrides())
            .expect("settings resolve")
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.settings()).expect("publisher")
    }
}

/// Run a git command in the given directory.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Run a git command and return its trimmed stdout.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}
