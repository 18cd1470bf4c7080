//! Brewcheck - build a Homebrew formula from a git checkout and prove it installs.
//!
//! The library exposes the pieces the `brewcheck` CLI and its test suite are
//! built from:
//! - [`archive`] - versioned `git archive` tarballs and their layout checks
//! - [`formula`] - formula text generation
//! - [`container`] - a narrow container runtime interface and the docker/podman CLI backend
//! - [`scenario`] - the local formula smoke run and the containerized install run
//! - [`report`] - JSON and human renderings of scenario results

pub mod archive;
pub mod cli;
pub mod config;
pub mod container;
pub mod errors;
pub mod formula;
pub mod process;
pub mod report;
pub mod scenario;

use std::time::Duration;

/// Library-level error type for Brewcheck operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid version '{0}': must start with a digit and contain only [A-Za-z0-9._-]")]
    InvalidVersion(String),

    /// An external command exited unsuccessfully.
    ///
    /// `exit_code` is `None` when the process was terminated by a signal.
    #[error("`{program}` failed with {}: {output}", describe_exit(.exit_code))]
    Process {
        program: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {after:?} while {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Unexpected archive layout: {0}")]
    ArchiveLayout(String),

    #[error("Install failed inside container with status code {status_code}")]
    InstallFailed { status_code: i64, log_lines: usize },

    #[error("{0}")]
    Other(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type alias for Brewcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_mentions_exit_code_and_output() {
        let err = Error::Process {
            program: "git".to_string(),
            exit_code: Some(128),
            output: "fatal: not a git repository".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`git`"));
        assert!(msg.contains("exit code 128"));
        assert!(msg.contains("not a git repository"));
    }

    #[test]
    fn test_process_error_without_exit_code() {
        let err = Error::Process {
            program: "docker".to_string(),
            exit_code: None,
            output: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }
}
