//! Container runtime interface used by the install scenario.
//!
//! The scenario only needs a handful of operations, so the runtime is a narrow
//! trait. [`DockerCli`] drives the `docker` or `podman` CLI; tests plug in a fake.

mod docker;

pub use docker::DockerCli;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::process::Child;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Environment variable that stops `brew` from updating itself before every command.
pub const NO_AUTO_UPDATE_ENV: &str = "HOMEBREW_NO_AUTO_UPDATE";

/// An image reference, e.g. `linuxbrew/linuxbrew:latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Mount mode (read-only or read-write)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl std::str::FromStr for MountMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ro" => Ok(Self::ReadOnly),
            "rw" => Ok(Self::ReadWrite),
            _ => Err(Error::Config(format!(
                "Invalid mount mode: '{}' (expected 'ro' or 'rw')",
                s
            ))),
        }
    }
}

/// A host path bind-mounted into the container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mount {
    /// Absolute host path
    pub source: String,
    /// Absolute path inside the container
    pub target: String,
    pub mode: MountMode,
}

impl Mount {
    /// Bind mount `source` at `target`. Both must be absolute and free of
    /// commas, which would split the `--mount` field list.
    pub fn bind(source: impl Into<String>, target: impl Into<String>, mode: MountMode) -> Result<Self> {
        let mount = Self {
            source: source.into(),
            target: target.into(),
            mode,
        };
        if !mount.target.starts_with('/') {
            return Err(Error::InvalidInput(format!(
                "mount target must be absolute path, got '{}'",
                mount.target
            )));
        }
        if !mount.source.starts_with('/') {
            return Err(Error::InvalidInput(format!(
                "mount source must be absolute path, got '{}'",
                mount.source
            )));
        }
        for path in [&mount.source, &mount.target] {
            if path.contains(',') {
                return Err(Error::InvalidInput(format!(
                    "mount path cannot contain ',', got '{}'",
                    path
                )));
            }
        }
        Ok(mount)
    }
}

/// Everything needed to create a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageRef,
    pub mounts: Vec<Mount>,
    /// argv for the container's main process
    pub command: Vec<String>,
    pub environment: Vec<(String, String)>,
}

/// Result of waiting for a container to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitStatus {
    #[serde(rename = "StatusCode")]
    pub status_code: i64,
}

impl WaitStatus {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

/// Subset of `docker container inspect` state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerState {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Running", default)]
    pub running: bool,
    #[serde(rename = "ExitCode", default)]
    pub exit_code: i64,
}

/// The operations the install scenario needs from a container runtime.
pub trait ContainerRuntime {
    fn pull_image(&self, image: &ImageRef) -> Result<()>;

    /// Create (but do not start) a container, returning its id.
    fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    fn start(&self, id: &str) -> Result<()>;

    /// Follow the container's combined stdout/stderr until it stops producing output.
    fn stream_logs(&self, id: &str) -> Result<LogStream>;

    /// Block until the container exits or `timeout` elapses ([`Error::Timeout`]).
    fn wait(&self, id: &str, timeout: Duration) -> Result<WaitStatus>;

    fn remove(&self, id: &str, force: bool) -> Result<()>;

    /// Whether the runtime still knows about the container.
    fn exists(&self, id: &str) -> Result<bool>;
}

/// Lazy, finite sequence of log lines.
///
/// Lines arrive over a channel fed by reader threads. Iteration ends when every
/// sender hangs up or, if set, the deadline passes; see [`LogStream::timed_out`].
pub struct LogStream {
    lines: Receiver<String>,
    deadline: Option<Instant>,
    timed_out: bool,
    follower: Option<Child>,
}

impl LogStream {
    pub(crate) fn new(lines: Receiver<String>, follower: Option<Child>) -> Self {
        Self {
            lines,
            deadline: None,
            timed_out: false,
            follower,
        }
    }

    /// A stream over fixed lines, for runtimes that buffer logs.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = std::sync::mpsc::channel();
        for line in lines {
            let _ = tx.send(line.into());
        }
        Self::new(rx, None)
    }

    /// Stop yielding lines once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether iteration stopped because the deadline passed.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    fn stop_follower(&mut self) {
        if let Some(mut child) = self.follower.take() {
            crate::process::kill_quietly(&mut child);
        }
    }
}

impl Iterator for LogStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.timed_out {
            return None;
        }
        let line = match self.deadline {
            None => self.lines.recv().ok(),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.lines.recv_timeout(remaining) {
                    Ok(line) => Some(line),
                    Err(RecvTimeoutError::Timeout) => {
                        self.timed_out = true;
                        None
                    }
                    Err(RecvTimeoutError::Disconnected) => None,
                }
            }
        };
        if line.is_none() {
            self.stop_follower();
        }
        line
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.stop_follower();
    }
}

/// Owns a created container and force-removes it when dropped.
///
/// Removal runs on every exit path, including early `?` returns and panics
/// while the guard is alive.
pub struct ContainerGuard<'r, R: ContainerRuntime + ?Sized> {
    runtime: &'r R,
    id: Option<String>,
}

impl<'r, R: ContainerRuntime + ?Sized> ContainerGuard<'r, R> {
    /// Create a container from `spec` and take ownership of it.
    pub fn create(runtime: &'r R, spec: &ContainerSpec) -> Result<Self> {
        let id = runtime.create_container(spec)?;
        tracing::info!(container = %id, name = %spec.name, image = %spec.image, "created container");
        Ok(Self {
            runtime,
            id: Some(id),
        })
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Remove now and report failures instead of only logging them.
    pub fn remove(mut self) -> Result<()> {
        match self.id.take() {
            Some(id) => {
                self.runtime.remove(&id, true)?;
                tracing::info!(container = %id, "removed container");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<R: ContainerRuntime + ?Sized> Drop for ContainerGuard<'_, R> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            match self.runtime.remove(&id, true) {
                Ok(()) => tracing::info!(container = %id, "removed container"),
                Err(e) => tracing::warn!(container = %id, error = %e, "failed to remove container"),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`ContainerRuntime`] for scenario tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// How the fake container behaves once started.
    #[derive(Debug, Clone)]
    pub enum Behavior {
        Exit { logs: Vec<String>, status_code: i64 },
        /// Logs never finish
        Hang,
        /// Logs finish but the container never exits
        HangInWait { logs: Vec<String> },
    }

    pub struct FakeRuntime {
        pub behavior: Behavior,
        pub fail_pull: bool,
        pub events: RefCell<Vec<String>>,
        pub specs: RefCell<Vec<ContainerSpec>>,
        live: RefCell<HashSet<String>>,
    }

    impl FakeRuntime {
        pub fn exiting(status_code: i64, logs: &[&str]) -> Self {
            Self::with_behavior(Behavior::Exit {
                logs: logs.iter().map(|l| l.to_string()).collect(),
                status_code,
            })
        }

        pub fn hanging() -> Self {
            Self::with_behavior(Behavior::Hang)
        }

        pub fn hanging_in_wait(logs: &[&str]) -> Self {
            Self::with_behavior(Behavior::HangInWait {
                logs: logs.iter().map(|l| l.to_string()).collect(),
            })
        }

        fn with_behavior(behavior: Behavior) -> Self {
            Self {
                behavior,
                fail_pull: false,
                events: RefCell::new(Vec::new()),
                specs: RefCell::new(Vec::new()),
                live: RefCell::new(HashSet::new()),
            }
        }

        pub fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }

        fn record(&self, event: String) {
            self.events.borrow_mut().push(event);
        }
    }

    impl ContainerRuntime for FakeRuntime {
        fn pull_image(&self, image: &ImageRef) -> Result<()> {
            self.record(format!("pull {}", image));
            if self.fail_pull {
                return Err(Error::Process {
                    program: "docker".to_string(),
                    exit_code: Some(1),
                    output: "pull access denied".to_string(),
                });
            }
            Ok(())
        }

        fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
            let id = format!("fake-{}", self.specs.borrow().len());
            self.record(format!("create {}", id));
            self.specs.borrow_mut().push(spec.clone());
            self.live.borrow_mut().insert(id.clone());
            Ok(id)
        }

        fn start(&self, id: &str) -> Result<()> {
            self.record(format!("start {}", id));
            Ok(())
        }

        fn stream_logs(&self, id: &str) -> Result<LogStream> {
            self.record(format!("logs {}", id));
            match &self.behavior {
                Behavior::Exit { logs, .. } | Behavior::HangInWait { logs } => {
                    Ok(LogStream::from_lines(logs.clone()))
                }
                Behavior::Hang => {
                    // Sender outlives any test deadline, so the stream has to time out.
                    let (tx, rx) = std::sync::mpsc::channel::<String>();
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_secs(5));
                        drop(tx);
                    });
                    Ok(LogStream::new(rx, None))
                }
            }
        }

        fn wait(&self, id: &str, timeout: Duration) -> Result<WaitStatus> {
            self.record(format!("wait {}", id));
            match &self.behavior {
                Behavior::Exit { status_code, .. } => Ok(WaitStatus {
                    status_code: *status_code,
                }),
                Behavior::Hang | Behavior::HangInWait { .. } => Err(Error::Timeout {
                    operation: format!("waiting for container {}", id),
                    after: timeout,
                }),
            }
        }

        fn remove(&self, id: &str, force: bool) -> Result<()> {
            self.record(format!("remove {} force={}", id, force));
            self.live.borrow_mut().remove(id);
            Ok(())
        }

        fn exists(&self, id: &str) -> Result<bool> {
            Ok(self.live.borrow().contains(id))
        }
    }
}
