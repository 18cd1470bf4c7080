//! External process invocation.
//!
//! Every CLI tool brewcheck talks to (git, docker, podman) goes through the
//! [`ProcessRunner`] trait so scenarios can be exercised against a recording
//! fake instead of the real binaries.

use crate::{Error, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// A single command line to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Kill the process and fail with [`Error::Timeout`] if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Render as a shell-like string for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a successful process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    /// stdout followed by stderr
    pub output: String,
    pub stdout: String,
}

/// Capability to run external commands.
///
/// Implementations must return [`Error::Process`] when the command exits
/// unsuccessfully, carrying the exit code and the captured output.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput>;
}

/// Runs commands on the host with `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        tracing::debug!(command = %invocation.display(), "running");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match invocation.timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    kill_quietly(&mut child);
                    return Err(Error::Timeout {
                        operation: format!("running `{}`", invocation.display()),
                        after: limit,
                    });
                }
            },
            None => child.wait()?,
        };

        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);
        let mut output = stdout.clone();
        output.push_str(&stderr);

        match status.code() {
            Some(0) => Ok(ProcessOutput {
                exit_code: 0,
                output,
                stdout,
            }),
            code => Err(Error::Process {
                program: invocation.program.clone(),
                exit_code: code,
                output: output.trim().to_string(),
            }),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Kill and reap a child, ignoring errors from an already-exited process.
pub(crate) fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
