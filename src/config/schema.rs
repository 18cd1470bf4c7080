//! KDL schema for `brewcheck.kdl`.
//!
//! ```kdl
//! runtime "docker"
//! image "linuxbrew/linuxbrew" tag="latest"
//! version "1"
//! formula "vws.rb"
//! tool "vws"
//! timeout-secs 1800
//! output-format "human"
//! env "HOMEBREW_NO_ANALYTICS" "1"
//! resource "click" url="https://files.pythonhosted.org/.../click-8.1.7.tar.gz" sha256="ca9..."
//! ```

use super::resolver::MAX_TIMEOUT_SECS;
use crate::archive::looks_like_version;
use crate::formula::{FormulaResource, formula_name};
use crate::{Error, Result};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};

/// Output format for scenario reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Values read from a config file. Unset fields fall through to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrewcheckConfig {
    /// Container CLI binary (`docker`, `podman`)
    pub runtime: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    /// Version token used for the archive name and prefix
    pub version: Option<String>,
    /// Recipe file name, e.g. `vws.rb`
    pub formula: Option<String>,
    /// Executable checked with `--version` after install
    pub tool: Option<String>,
    pub timeout_secs: Option<u64>,
    pub output_format: Option<OutputFormat>,
    /// Extra container environment, in file order
    pub env: Vec<(String, String)>,
    /// Python packages rendered as formula `resource` blocks
    pub resources: Vec<FormulaResource>,
}

impl BrewcheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config text.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|e: kdl::KdlError| Error::Config(format!("invalid KDL syntax: {}", e)))?;
        Self::from_kdl(&doc)
    }

    /// Parse config from a KDL document, rejecting unknown nodes and bad values.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let mut config = Self::new();

        for node in doc.nodes() {
            let name = node.name().value().to_string();
            match name.as_str() {
                "runtime" => config.runtime = Some(first_string(node)?),
                "image" => {
                    config.image = Some(first_string(node)?);
                    if let Some(tag) = node.get("tag") {
                        let tag = tag.as_string().ok_or_else(|| {
                            Error::Config("image tag must be a string".to_string())
                        })?;
                        config.tag = Some(tag.to_string());
                    }
                }
                "version" => config.version = Some(first_string(node)?),
                "formula" => config.formula = Some(first_string(node)?),
                "tool" => config.tool = Some(first_string(node)?),
                "timeout-secs" => {
                    let secs = node
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_integer())
                        .ok_or_else(|| {
                            Error::Config("timeout-secs needs an integer argument".to_string())
                        })?;
                    config.timeout_secs = Some(u64::try_from(secs).map_err(|_| {
                        Error::Config(format!("timeout-secs must be positive, got {}", secs))
                    })?);
                }
                "output-format" => {
                    let value = first_string(node)?;
                    config.output_format = Some(OutputFormat::parse(&value).ok_or_else(|| {
                        Error::Config(format!(
                            "output-format must be 'json' or 'human', got '{}'",
                            value
                        ))
                    })?);
                }
                "env" => {
                    let values: Vec<&str> = node
                        .entries()
                        .iter()
                        .filter(|e| e.name().is_none())
                        .filter_map(|e| e.value().as_string())
                        .collect();
                    match values.as_slice() {
                        [key, value] => config.env.push((key.to_string(), value.to_string())),
                        _ => {
                            return Err(Error::Config(
                                "env needs exactly two string arguments: env \"KEY\" \"value\""
                                    .to_string(),
                            ));
                        }
                    }
                }
                "resource" => {
                    let name = first_string(node)?;
                    let property = |key: &str| {
                        node.get(key)
                            .and_then(|v| v.as_string())
                            .map(str::to_string)
                            .ok_or_else(|| {
                                Error::Config(format!(
                                    "resource '{}' needs a string {}= property",
                                    name, key
                                ))
                            })
                    };
                    let resource = FormulaResource {
                        url: property("url")?,
                        sha256: property("sha256")?,
                        name: name.clone(),
                    };
                    config.resources.push(resource);
                }
                other => {
                    return Err(Error::Config(format!("unknown config node '{}'", other)));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the config values.
    pub fn validate(&self) -> Result<()> {
        if let Some(version) = &self.version {
            if !looks_like_version(version) {
                return Err(Error::Config(format!(
                    "version '{}' does not look like a version",
                    version
                )));
            }
        }
        if let Some(formula) = &self.formula {
            formula_name(formula).map_err(|e| Error::Config(e.to_string()))?;
        }
        match self.timeout_secs {
            Some(0) => {
                return Err(Error::Config("timeout-secs must be positive".to_string()));
            }
            Some(secs) if secs > MAX_TIMEOUT_SECS => {
                return Err(Error::Config(format!(
                    "timeout-secs {} exceeds the maximum of {}",
                    secs, MAX_TIMEOUT_SECS
                )));
            }
            _ => {}
        }
        Ok(())
    }

    /// Values from `other` override values in `self` if they are Some.
    /// Environment entries and resources accumulate.
    pub fn merge(&mut self, other: &BrewcheckConfig) {
        if other.runtime.is_some() {
            self.runtime = other.runtime.clone();
        }
        if other.image.is_some() {
            self.image = other.image.clone();
        }
        if other.tag.is_some() {
            self.tag = other.tag.clone();
        }
        if other.version.is_some() {
            self.version = other.version.clone();
        }
        if other.formula.is_some() {
            self.formula = other.formula.clone();
        }
        if other.tool.is_some() {
            self.tool = other.tool.clone();
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.output_format.is_some() {
            self.output_format = other.output_format;
        }
        self.env.extend(other.env.iter().cloned());
        self.resources.extend(other.resources.iter().cloned());
    }
}

fn first_string(node: &KdlNode) -> Result<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::Config(format!(
                "'{}' needs a string argument",
                node.name().value()
            ))
        })
}
