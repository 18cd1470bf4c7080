//! Common test utilities for brewcheck integration tests.
//!
//! Provides `TestEnv`, a throwaway git checkout with one commit, so tests
//! never package the real repository or read the user's config.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
pub use tempfile::TempDir;

/// A git checkout plus an isolated config home.
///
/// The `brewcheck()` method returns a `Command` running inside the checkout
/// with `XDG_CONFIG_HOME` pointed at an empty directory, making tests
/// parallel-safe.
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub config_home: TempDir,
}

impl TestEnv {
    /// A directory that is not a git checkout.
    pub fn bare() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            config_home: TempDir::new().unwrap(),
        }
    }

    /// A git checkout with a single commit containing a `setup.py`.
    pub fn new() -> Self {
        let env = Self::bare();
        env.git(&["init", "-q"]);
        env.git(&["config", "user.email", "test@example.com"]);
        env.git(&["config", "user.name", "Test"]);
        env.git(&["config", "commit.gpgsign", "false"]);
        env.write("setup.py", "from setuptools import setup\n\nsetup(name=\"vws-cli\")\n");
        env.write("src/vws/__init__.py", "");
        env.git(&["add", "."]);
        env.git(&["commit", "-q", "-m", "initial"]);
        env
    }

    /// Run git inside the checkout, failing the test on error.
    pub fn git(&self, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(self.repo_dir.path())
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    /// Write a file relative to the checkout root.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.repo_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Get a Command for the brewcheck binary, run from the checkout root.
    pub fn brewcheck(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_brewcheck"));
        cmd.current_dir(self.repo_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.config_home.path());
        cmd.env_remove("BREWCHECK_CONFIG");
        cmd.env_remove("BREWCHECK_REPO");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Get the path to the checkout.
    pub fn repo_path(&self) -> &Path {
        self.repo_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a JSON report printed on stdout.
pub fn parse_json(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).expect("stdout should be a JSON report")
}
