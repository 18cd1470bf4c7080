//! Precedence resolution for brewcheck settings.
//!
//! ## Config file search (first existing file wins)
//!
//! 1. `--config <path>` / `BREWCHECK_CONFIG`
//! 2. `./brewcheck.kdl`
//! 3. `~/.config/brewcheck/config.kdl`
//!
//! ## Value precedence (highest to lowest)
//!
//! 1. CLI flags
//! 2. Config file
//! 3. Built-in defaults

use super::schema::{BrewcheckConfig, OutputFormat};
use crate::archive::DEFAULT_VERSION;
use crate::container::{ImageRef, NO_AUTO_UPDATE_ENV};
use crate::formula::{DEFAULT_RECIPE_FILENAME, FormulaResource, formula_name};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "brewcheck.kdl";

pub const DEFAULT_RUNTIME: &str = "docker";
pub const DEFAULT_IMAGE: &str = "linuxbrew/linuxbrew";
pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;
/// Longest install timeout accepted from flags or config (one week).
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from a config file
    File(PathBuf),
    /// Derived from another resolved value
    Derived,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::File(path) => write!(f, "file:{}", path.display()),
            ValueSource::Derived => write!(f, "derived"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub runtime: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    pub version: Option<String>,
    pub formula: Option<String>,
    pub tool: Option<String>,
    pub timeout_secs: Option<u64>,
    pub output_format: Option<OutputFormat>,
}

/// Fully resolved settings for a scenario run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// File the values were read from, if any
    pub config_file: Option<PathBuf>,
    pub runtime: Resolved<String>,
    pub image: Resolved<ImageRef>,
    pub version: Resolved<String>,
    pub recipe_filename: Resolved<String>,
    pub tool: Resolved<String>,
    pub timeout: Resolved<Duration>,
    pub output_format: Resolved<OutputFormat>,
    /// Container environment; the auto-update switch always comes first
    pub environment: Vec<(String, String)>,
    /// Formula `resource` blocks from the config file
    pub resources: Vec<FormulaResource>,
}

/// Resolve one value in precedence order: flag, file, fallback.
fn pick<T: Clone>(
    flag: Option<&T>,
    file: Option<&T>,
    file_source: &Option<PathBuf>,
    fallback: Resolved<T>,
) -> Resolved<T> {
    if let Some(value) = flag {
        return Resolved::new(value.clone(), ValueSource::CliFlag);
    }
    match (file, file_source) {
        (Some(value), Some(path)) => Resolved::new(value.clone(), ValueSource::File(path.clone())),
        _ => fallback,
    }
}

/// Locate the config file to load, if any.
pub fn find_config_file(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let project = cwd.join(PROJECT_CONFIG_FILE);
    if project.is_file() {
        return Ok(Some(project));
    }

    Ok(system_config_path().filter(|p| p.is_file()))
}

/// `~/.config/brewcheck/config.kdl`
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("brewcheck").join("config.kdl"))
}

/// Load and parse a config file.
pub fn load_config(path: &Path) -> Result<BrewcheckConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
    BrewcheckConfig::parse(&text)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
}

/// Resolve settings from overrides and whichever config file applies in `cwd`.
pub fn resolve_settings(overrides: &ConfigOverrides, cwd: &Path) -> Result<Settings> {
    let config_file = find_config_file(overrides.config_file.as_deref(), cwd)?;
    let file = match &config_file {
        Some(path) => load_config(path)?,
        None => BrewcheckConfig::default(),
    };
    resolve_with(overrides, &file, config_file)
}

/// Resolve settings against an already-loaded config.
pub fn resolve_with(
    overrides: &ConfigOverrides,
    file: &BrewcheckConfig,
    config_file: Option<PathBuf>,
) -> Result<Settings> {
    let src = &config_file;
    let default = |v: &str| Resolved::new(v.to_string(), ValueSource::Default);

    let runtime = pick(
        overrides.runtime.as_ref(),
        file.runtime.as_ref(),
        src,
        default(DEFAULT_RUNTIME),
    );
    let repository = pick(
        overrides.image.as_ref(),
        file.image.as_ref(),
        src,
        default(DEFAULT_IMAGE),
    );
    let tag = pick(overrides.tag.as_ref(), file.tag.as_ref(), src, default(DEFAULT_TAG));
    let image_source = if repository.source == ValueSource::Default {
        tag.source.clone()
    } else {
        repository.source.clone()
    };
    let image = Resolved::new(ImageRef::new(repository.value, tag.value), image_source);

    let version = pick(
        overrides.version.as_ref(),
        file.version.as_ref(),
        src,
        default(DEFAULT_VERSION),
    );
    let recipe_filename = pick(
        overrides.formula.as_ref(),
        file.formula.as_ref(),
        src,
        default(DEFAULT_RECIPE_FILENAME),
    );
    let derived_tool = formula_name(&recipe_filename.value)?.to_string();
    let tool = pick(
        overrides.tool.as_ref(),
        file.tool.as_ref(),
        src,
        Resolved::new(derived_tool, ValueSource::Derived),
    );
    let timeout_secs = pick(
        overrides.timeout_secs.as_ref(),
        file.timeout_secs.as_ref(),
        src,
        Resolved::new(DEFAULT_TIMEOUT_SECS, ValueSource::Default),
    );
    if timeout_secs.value == 0 {
        return Err(Error::Config("timeout must be positive".to_string()));
    }
    if timeout_secs.value > MAX_TIMEOUT_SECS {
        return Err(Error::Config(format!(
            "timeout of {}s exceeds the maximum of {}s",
            timeout_secs.value, MAX_TIMEOUT_SECS
        )));
    }
    let timeout = Resolved::new(Duration::from_secs(timeout_secs.value), timeout_secs.source);
    let output_format = pick(
        overrides.output_format.as_ref(),
        file.output_format.as_ref(),
        src,
        Resolved::new(OutputFormat::Json, ValueSource::Default),
    );

    let mut environment = vec![(NO_AUTO_UPDATE_ENV.to_string(), "1".to_string())];
    environment.extend(
        file.env
            .iter()
            .filter(|(key, _)| key != NO_AUTO_UPDATE_ENV)
            .cloned(),
    );

    Ok(Settings {
        config_file,
        runtime,
        image,
        version,
        recipe_filename,
        tool,
        timeout,
        output_format,
        environment,
        resources: file.resources.clone(),
    })
}
