//! [`ContainerRuntime`] backed by the `docker` (or `podman`) command line.

use super::{
    ContainerRuntime, ContainerSpec, ContainerState, ImageRef, LogStream, MountMode, WaitStatus,
};
use crate::process::{Invocation, ProcessRunner, SystemRunner};
use crate::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

/// Drives a Docker-compatible CLI through a [`ProcessRunner`].
pub struct DockerCli<P: ProcessRunner = SystemRunner> {
    binary: String,
    runner: P,
}

impl DockerCli<SystemRunner> {
    /// Use `binary` (`docker`, `podman`, or a path) on this host.
    pub fn new(binary: impl Into<String>) -> Self {
        Self::with_runner(binary, SystemRunner::new())
    }
}

impl<P: ProcessRunner> DockerCli<P> {
    pub fn with_runner(binary: impl Into<String>, runner: P) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(self.binary.clone())
    }

    /// Arguments for `<binary> create`.
    pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["create".to_string(), "--name".to_string(), spec.name.clone()];
        for mount in &spec.mounts {
            let mut value = format!("type=bind,source={},target={}", mount.source, mount.target);
            if mount.mode == MountMode::ReadOnly {
                value.push_str(",readonly");
            }
            args.push("--mount".to_string());
            args.push(value);
        }
        for (key, value) in &spec.environment {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.image.to_string());
        args.extend(spec.command.iter().cloned());
        args
    }
}

impl<P: ProcessRunner> ContainerRuntime for DockerCli<P> {
    fn pull_image(&self, image: &ImageRef) -> Result<()> {
        tracing::info!(image = %image, "pulling image");
        self.runner
            .run(&self.invocation().args(["pull".to_string(), image.to_string()]))?;
        Ok(())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let output = self
            .runner
            .run(&self.invocation().args(Self::create_args(spec)))?;
        // Pull progress may precede the id when the image is fetched implicitly.
        output
            .stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Other(format!(
                    "`{} create` did not print a container id",
                    self.binary
                ))
            })
    }

    fn start(&self, id: &str) -> Result<()> {
        self.runner.run(&self.invocation().args(["start", id]))?;
        Ok(())
    }

    fn stream_logs(&self, id: &str) -> Result<LogStream> {
        let mut child = Command::new(&self.binary)
            .args(["logs", "--follow", id])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx);
        }
        Ok(LogStream::new(rx, Some(child)))
    }

    fn wait(&self, id: &str, timeout: Duration) -> Result<WaitStatus> {
        let invocation = self.invocation().args(["wait", id]).timeout(timeout);
        let output = self.runner.run(&invocation).map_err(|e| match e {
            Error::Timeout { after, .. } => Error::Timeout {
                operation: format!("waiting for container {}", id),
                after,
            },
            other => other,
        })?;
        let text = output.stdout.trim();
        let status_code: i64 = text.lines().last().unwrap_or_default().trim().parse().map_err(|_| {
            Error::Other(format!(
                "`{} wait` printed '{}' instead of a status code",
                self.binary, text
            ))
        })?;
        Ok(WaitStatus { status_code })
    }

    fn remove(&self, id: &str, force: bool) -> Result<()> {
        let mut invocation = self.invocation().arg("rm");
        if force {
            invocation = invocation.arg("--force");
        }
        self.runner.run(&invocation.arg(id))?;
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let invocation = self
            .invocation()
            .args(["container", "inspect", "--format", "{{json .State}}", id]);
        match self.runner.run(&invocation) {
            Ok(output) => {
                let state: ContainerState = serde_json::from_str(output.stdout.trim())?;
                tracing::debug!(container = %id, status = %state.status, "inspected container");
                Ok(true)
            }
            Err(Error::Process { ref output, .. }) if is_missing_container(output) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Whether `inspect` output says the container is unknown, as opposed to
/// the daemon being unreachable or the call failing some other way.
fn is_missing_container(output: &str) -> bool {
    let output = output.to_ascii_lowercase();
    output.contains("no such container") || output.contains("no such object")
}

/// Send each line read from `pipe` into `tx`, stopping at EOF or when the receiver is gone.
fn forward_lines<R: Read + Send + 'static>(pipe: R, tx: Sender<String>) {
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.split(b'\n') {
            let Ok(line) = line else { break };
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}
