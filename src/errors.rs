//! Standardized error messages for the CLI.
//!
//! All errors printed by `brewcheck` follow the format:
//! ```text
//! brewcheck: error: <category>: <brief>
//!
//!   <details>
//!
//!   <suggestion>
//! ```

use crate::Error;
use std::fmt::Write;

/// Error category shown in CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Config file parsing and validation
    Config,
    /// git archive creation and archive layout
    Archive,
    /// Formula generation and writing
    Formula,
    /// Container runtime calls (pull, create, start, logs, remove)
    Run,
    /// Non-zero exit status from the install command
    Install,
    /// Deadline exceeded
    Timeout,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Archive => write!(f, "archive"),
            Self::Formula => write!(f, "formula"),
            Self::Run => write!(f, "run"),
            Self::Install => write!(f, "install"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Format a standardized error message.
pub fn format_error(
    category: ErrorCategory,
    brief: &str,
    details: Option<&str>,
    suggestion: Option<&str>,
) -> String {
    let mut msg = format!("brewcheck: error: {}: {}", category, brief);

    for block in [details, suggestion].into_iter().flatten() {
        msg.push_str("\n\n");
        for line in block.lines() {
            let _ = writeln!(msg, "  {}", line);
        }
        if msg.ends_with('\n') {
            msg.pop();
        }
    }

    msg
}

/// Pick the category for a library error.
pub fn categorize(err: &Error) -> ErrorCategory {
    match err {
        Error::Config(_) => ErrorCategory::Config,
        Error::InvalidVersion(_) | Error::ArchiveLayout(_) => ErrorCategory::Archive,
        Error::InvalidInput(_) => ErrorCategory::Formula,
        Error::InstallFailed { .. } => ErrorCategory::Install,
        Error::Timeout { .. } => ErrorCategory::Timeout,
        Error::Process { program, .. } | Error::Spawn { program, .. } if program == "git" => {
            ErrorCategory::Archive
        }
        Error::Io(_)
        | Error::Json(_)
        | Error::Process { .. }
        | Error::Spawn { .. }
        | Error::Other(_) => ErrorCategory::Run,
    }
}

/// Render a library error for the terminal, with a hint where one helps.
pub fn render(err: &Error) -> String {
    let category = categorize(err);
    match err {
        Error::InstallFailed {
            status_code,
            log_lines,
        } => format_error(
            category,
            "formula did not install cleanly",
            Some(&format!(
                "Container exited with status code {} after {} log lines.",
                status_code, log_lines
            )),
            Some("Re-run with -v to see the streamed install log."),
        ),
        Error::Spawn { program, source } => format_error(
            category,
            &format!("cannot run `{}`", program),
            Some(&source.to_string()),
            Some(&format!("Check that `{}` is installed and on PATH.", program)),
        ),
        Error::Process {
            program, output, ..
        } if program == "git" => {
            let details = if output.is_empty() {
                err.to_string()
            } else {
                output.clone()
            };
            format_error(
                category,
                "git command failed",
                Some(&details),
                Some("Run brewcheck from inside a git checkout with at least one commit."),
            )
        }
        Error::Timeout { .. } => format_error(
            category,
            &err.to_string(),
            None,
            Some("Raise timeout-secs in brewcheck.kdl or pass --timeout."),
        ),
        _ => format_error(category, &err.to_string(), None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_error_basic() {
        let msg = format_error(ErrorCategory::Config, "test brief", None, None);
        assert_eq!(msg, "brewcheck: error: config: test brief");
    }

    #[test]
    fn test_format_error_with_details_and_suggestion() {
        let msg = format_error(
            ErrorCategory::Run,
            "test brief",
            Some("detail line 1\ndetail line 2"),
            Some("suggestion"),
        );
        assert_eq!(
            msg,
            "brewcheck: error: run: test brief\n\n  detail line 1\n  detail line 2\n\n  suggestion"
        );
    }

    #[test]
    fn test_git_failures_are_archive_errors() {
        let err = Error::Process {
            program: "git".to_string(),
            exit_code: Some(128),
            output: "fatal: not a git repository".to_string(),
        };
        assert_eq!(categorize(&err), ErrorCategory::Archive);
        let msg = render(&err);
        assert!(msg.starts_with("brewcheck: error: archive: git command failed"));
        assert!(msg.contains("  fatal: not a git repository"));
    }

    #[test]
    fn test_docker_failures_are_run_errors() {
        let err = Error::Process {
            program: "docker".to_string(),
            exit_code: Some(1),
            output: "pull access denied".to_string(),
        };
        assert_eq!(categorize(&err), ErrorCategory::Run);
    }

    #[test]
    fn test_install_failure_rendering() {
        let msg = render(&Error::InstallFailed {
            status_code: 1,
            log_lines: 42,
        });
        assert!(msg.contains("brewcheck: error: install: formula did not install cleanly"));
        assert!(msg.contains("status code 1 after 42 log lines"));
        assert!(msg.contains("-v"));
    }

    #[test]
    fn test_timeout_rendering() {
        let msg = render(&Error::Timeout {
            operation: "waiting for container".to_string(),
            after: Duration::from_secs(5),
        });
        assert!(msg.starts_with("brewcheck: error: timeout:"));
        assert!(msg.contains("--timeout"));
    }
}
