//! The two end-to-end scenarios.
//!
//! - [`run_local_smoke`] builds the archive and writes a formula pointing at it.
//!   Nothing is installed.
//! - [`run_container_install`] mounts the archive and formula into a fresh
//!   Linuxbrew container, runs `brew install` and then `<tool> --version`, and
//!   fails unless the container exits with status 0.

use crate::archive::{self, Archive, ArchiveSummary};
use crate::config::Settings;
use crate::container::{
    ContainerGuard, ContainerRuntime, ContainerSpec, ImageRef, Mount, MountMode,
};
use crate::formula::{FormulaGenerator, FormulaRequest};
use crate::process::ProcessRunner;
use crate::report::{ContainerReport, ScenarioKind, ScenarioReport};
use crate::{Error, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Inputs shared by every scenario.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    /// Root of the git checkout being packaged
    pub repo: PathBuf,
    /// Directory receiving the archive and formula
    pub work_dir: PathBuf,
    pub version: String,
    pub recipe_filename: String,
    /// Executable checked with `--version` after install
    pub tool: String,
    pub image: ImageRef,
    pub environment: Vec<(String, String)>,
    /// Bound on log streaming plus waiting for the container
    pub timeout: Duration,
}

impl ScenarioContext {
    pub fn from_settings(settings: &Settings, repo: &Path, work_dir: &Path) -> Self {
        Self {
            repo: repo.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            version: settings.version.value.clone(),
            recipe_filename: settings.recipe_filename.value.clone(),
            tool: settings.tool.value.clone(),
            image: settings.image.value.clone(),
            environment: settings.environment.clone(),
            timeout: settings.timeout.value,
        }
    }

    fn formula_path(&self) -> PathBuf {
        self.work_dir.join(&self.recipe_filename)
    }
}

/// An archive that has been built and checked.
struct BuiltArchive {
    archive: Archive,
    summary: ArchiveSummary,
    sha256: String,
}

fn build_archive(ctx: &ScenarioContext, runner: &dyn ProcessRunner) -> Result<BuiltArchive> {
    std::fs::create_dir_all(&ctx.work_dir)?;
    let archive = archive::create_archive(runner, &ctx.repo, &ctx.work_dir, &ctx.version)?;
    let summary = archive::verify_archive(&archive.path, &archive.version)?;
    let sha256 = archive.sha256()?;
    Ok(BuiltArchive {
        archive,
        summary,
        sha256,
    })
}

/// Generate formula text and write it to `<work_dir>/<recipe_filename>`.
fn write_formula(
    ctx: &ScenarioContext,
    generator: &dyn FormulaGenerator,
    request: &FormulaRequest,
) -> Result<PathBuf> {
    let text = generator.generate(request)?;
    if text.trim().is_empty() {
        return Err(Error::InvalidInput(
            "formula generator returned empty text".to_string(),
        ));
    }
    let path = ctx.formula_path();
    std::fs::write(&path, text)?;
    tracing::info!(formula = %path.display(), url = %request.archive_url, "wrote formula");
    Ok(path)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Build the archive only.
pub fn run_archive(ctx: &ScenarioContext, runner: &dyn ProcessRunner) -> Result<ScenarioReport> {
    let started_at = Utc::now();
    let started = Instant::now();
    let built = build_archive(ctx, runner)?;
    Ok(ScenarioReport {
        scenario: ScenarioKind::Archive,
        started_at,
        finished_at: Utc::now(),
        duration_ms: elapsed_ms(started),
        version: built.archive.version.clone(),
        archive: built.archive.path,
        archive_sha256: built.sha256,
        archive_entries: built.summary.entries,
        formula: None,
        archive_url: None,
        head_url: None,
        container: None,
    })
}

/// Write a formula that installs from the local archive. No install is attempted.
pub fn run_local_smoke(
    ctx: &ScenarioContext,
    runner: &dyn ProcessRunner,
    generator: &dyn FormulaGenerator,
) -> Result<ScenarioReport> {
    let started_at = Utc::now();
    let started = Instant::now();

    let built = build_archive(ctx, runner)?;
    let request = FormulaRequest {
        archive_url: built.archive.file_url()?,
        head_url: archive::head_url(&ctx.repo)?,
        recipe_filename: ctx.recipe_filename.clone(),
        archive_sha256: Some(built.sha256.clone()),
    };
    let formula = write_formula(ctx, generator, &request)?;

    Ok(ScenarioReport {
        scenario: ScenarioKind::Local,
        started_at,
        finished_at: Utc::now(),
        duration_ms: elapsed_ms(started),
        version: built.archive.version.clone(),
        archive: built.archive.path,
        archive_sha256: built.sha256,
        archive_entries: built.summary.entries,
        formula: Some(formula),
        archive_url: Some(request.archive_url),
        head_url: Some(request.head_url),
        container: None,
    })
}

/// Container path for the archive.
///
/// Homebrew reads the version off the URL, so the mount point reuses the
/// archive's stem (`1.tar.gz` -> `/1.tar`).
pub fn container_archive_path(archive: &Archive) -> String {
    format!("/{}", archive.stem())
}

/// `bash -c` command that installs the formula and, only if that worked, runs the tool.
///
/// `brew install` runs without `-v`; verbose output overflows CI log limits.
pub fn install_command(container_formula_path: &str, tool: &str) -> Vec<String> {
    vec![
        "/bin/bash".to_string(),
        "-c".to_string(),
        format!("brew install {} && {} --version", container_formula_path, tool),
    ]
}

/// `timeout` from now, or a config error if the clock cannot represent it.
fn deadline_after(timeout: Duration) -> Result<Instant> {
    Instant::now().checked_add(timeout).ok_or_else(|| {
        Error::Config(format!("timeout of {}s is too large", timeout.as_secs()))
    })
}

fn host_path(path: &Path) -> Result<String> {
    Ok(path.canonicalize()?.to_string_lossy().into_owned())
}

/// Install the formula inside a fresh container and require exit status 0.
///
/// The container is force-removed on every path out of this function.
pub fn run_container_install(
    ctx: &ScenarioContext,
    runner: &dyn ProcessRunner,
    generator: &dyn FormulaGenerator,
    runtime: &dyn ContainerRuntime,
) -> Result<ScenarioReport> {
    let started_at = Utc::now();
    let started = Instant::now();
    deadline_after(ctx.timeout)?;

    let built = build_archive(ctx, runner)?;
    let archive_target = container_archive_path(&built.archive);
    let request = FormulaRequest {
        archive_url: format!("file://{}", archive_target),
        head_url: archive::head_url(&ctx.repo)?,
        recipe_filename: ctx.recipe_filename.clone(),
        archive_sha256: Some(built.sha256.clone()),
    };
    let formula = write_formula(ctx, generator, &request)?;
    let formula_target = format!("/{}", ctx.recipe_filename);

    let mounts = vec![
        Mount::bind(
            host_path(&built.archive.path)?,
            archive_target.clone(),
            MountMode::ReadOnly,
        )?,
        Mount::bind(host_path(&formula)?, formula_target.clone(), MountMode::ReadOnly)?,
    ];

    runtime.pull_image(&ctx.image)?;

    let spec = ContainerSpec {
        name: format!("brewcheck-{}", uuid::Uuid::new_v4()),
        image: ctx.image.clone(),
        mounts,
        command: install_command(&formula_target, &ctx.tool),
        environment: ctx.environment.clone(),
    };

    let deadline = deadline_after(ctx.timeout)?;
    let container = ContainerGuard::create(runtime, &spec)?;
    let id = container.id().to_string();
    runtime.start(&id)?;

    let mut logs = runtime.stream_logs(&id)?.with_deadline(deadline);
    let mut log_lines = 0;
    for line in logs.by_ref() {
        log_lines += 1;
        tracing::info!(target: "brewcheck::container", "{}", line);
    }
    if logs.timed_out() {
        return Err(Error::Timeout {
            operation: format!("streaming logs from container {}", spec.name),
            after: ctx.timeout,
        });
    }
    drop(logs);

    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(Error::Timeout {
            operation: format!("waiting for container {}", spec.name),
            after: ctx.timeout,
        });
    }
    let status = runtime.wait(&id, remaining)?;
    tracing::info!(container = %spec.name, status_code = status.status_code, "container exited");

    if !status.success() {
        return Err(Error::InstallFailed {
            status_code: status.status_code,
            log_lines,
        });
    }

    container.remove()?;
    let removed = !runtime.exists(&id)?;
    if !removed {
        tracing::warn!(container = %spec.name, "container still present after removal");
    }

    Ok(ScenarioReport {
        scenario: ScenarioKind::Install,
        started_at,
        finished_at: Utc::now(),
        duration_ms: elapsed_ms(started),
        version: built.archive.version.clone(),
        archive: built.archive.path,
        archive_sha256: built.sha256,
        archive_entries: built.summary.entries,
        formula: Some(formula),
        archive_url: Some(request.archive_url),
        head_url: Some(request.head_url),
        container: Some(ContainerReport {
            name: spec.name,
            id,
            image: ctx.image.to_string(),
            archive_target,
            formula_target,
            status_code: status.status_code,
            log_lines,
            removed,
        }),
    })
}
