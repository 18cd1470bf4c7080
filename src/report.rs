//! Reports printed by the CLI.

use crate::config::{Resolved, Settings};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Which scenario produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    /// Archive only
    Archive,
    /// Archive plus formula written locally
    Local,
    /// Full install inside a container
    Install,
}

impl std::fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Local => write!(f, "local"),
            Self::Install => write!(f, "install"),
        }
    }
}

/// Container side of an install run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerReport {
    pub name: String,
    pub id: String,
    pub image: String,
    /// Where the archive was mounted inside the container
    pub archive_target: String,
    /// Where the formula was mounted inside the container
    pub formula_target: String,
    pub status_code: i64,
    pub log_lines: usize,
    pub removed: bool,
}

/// Outcome of a successful scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: ScenarioKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub version: String,
    pub archive: PathBuf,
    pub archive_sha256: String,
    pub archive_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerReport>,
}

impl CommandResult for ScenarioReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
    }

    fn to_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} scenario passed in {:.1}s",
            self.scenario,
            self.duration_ms as f64 / 1000.0
        );
        let _ = writeln!(
            out,
            "  archive: {} ({} entries under {}/)",
            self.archive.display(),
            self.archive_entries,
            self.version
        );
        let _ = writeln!(out, "  sha256:  {}", self.archive_sha256);
        if let Some(formula) = &self.formula {
            let _ = writeln!(out, "  formula: {}", formula.display());
        }
        if let Some(url) = &self.archive_url {
            let _ = writeln!(out, "  url:     {}", url);
        }
        if let Some(head) = &self.head_url {
            let _ = writeln!(out, "  head:    {}", head);
        }
        if let Some(c) = &self.container {
            let _ = writeln!(out, "  image:   {}", c.image);
            let _ = writeln!(out, "  container {} exited with {}", c.name, c.status_code);
            let _ = writeln!(out, "    mounts: {} and {}", c.archive_target, c.formula_target);
            let _ = writeln!(
                out,
                "    {} log lines, {}",
                c.log_lines,
                if c.removed { "removed" } else { "still present" }
            );
        }
        out.trim_end().to_string()
    }
}

/// One effective setting and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

impl SettingEntry {
    fn new<T: std::fmt::Display>(key: &'static str, resolved: &Resolved<T>) -> Self {
        Self {
            key,
            value: resolved.value.to_string(),
            source: resolved.source.to_string(),
        }
    }
}

/// Output of `brewcheck config show`.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsReport {
    pub config_file: Option<PathBuf>,
    pub settings: Vec<SettingEntry>,
    pub environment: Vec<(String, String)>,
}

impl From<&Settings> for SettingsReport {
    fn from(settings: &Settings) -> Self {
        let timeout = Resolved::new(
            settings.timeout.value.as_secs(),
            settings.timeout.source.clone(),
        );
        Self {
            config_file: settings.config_file.clone(),
            settings: vec![
                SettingEntry::new("runtime", &settings.runtime),
                SettingEntry::new("image", &settings.image),
                SettingEntry::new("version", &settings.version),
                SettingEntry::new("formula", &settings.recipe_filename),
                SettingEntry::new("tool", &settings.tool),
                SettingEntry::new("timeout-secs", &timeout),
                SettingEntry::new("output-format", &settings.output_format),
            ],
            environment: settings.environment.clone(),
        }
    }
}

impl CommandResult for SettingsReport {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
    }

    fn to_human(&self) -> String {
        let mut out = String::new();
        match &self.config_file {
            Some(path) => {
                let _ = writeln!(out, "config file: {}", path.display());
            }
            None => {
                let _ = writeln!(out, "config file: (none)");
            }
        }
        let width = self.settings.iter().map(|e| e.key.len()).max().unwrap_or(0);
        for entry in &self.settings {
            let _ = writeln!(
                out,
                "  {:width$}  {}  ({})",
                entry.key,
                entry.value,
                entry.source,
                width = width
            );
        }
        let _ = writeln!(out, "environment:");
        for (key, value) in &self.environment {
            let _ = writeln!(out, "  {}={}", key, value);
        }
        out.trim_end().to_string()
    }
}
