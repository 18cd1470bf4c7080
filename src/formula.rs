//! Homebrew formula generation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Default recipe file name; Homebrew names the formula after it.
pub const DEFAULT_RECIPE_FILENAME: &str = "vws.rb";

/// Inputs for rendering a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRequest {
    /// Where Homebrew downloads the source archive from
    pub archive_url: String,
    /// Live repository for `brew install --HEAD`
    pub head_url: String,
    /// File the formula is written to, e.g. `vws.rb`
    pub recipe_filename: String,
    pub archive_sha256: Option<String>,
}

/// Produces formula text. Implementations may shell out or template.
pub trait FormulaGenerator {
    fn generate(&self, request: &FormulaRequest) -> Result<String>;
}

/// A Python package vendored into the formula's virtualenv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaResource {
    /// Distribution name, e.g. `click`
    pub name: String,
    pub url: String,
    pub sha256: String,
}

/// Renders a formula for a Python command-line tool installed into a virtualenv.
///
/// Homebrew builds the virtualenv without network access, so every Python
/// dependency of the tool has to be listed in `resources`. With none, only a
/// tool without third-party dependencies installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomebrewFormula {
    pub description: String,
    pub homepage: String,
    /// Formula dependency providing the interpreter
    pub python: String,
    /// Executable run by the `test do` block. Defaults to the recipe name.
    pub tool: Option<String>,
    pub resources: Vec<FormulaResource>,
}

impl Default for HomebrewFormula {
    fn default() -> Self {
        Self {
            description: "CLI for Vuforia Web Services".to_string(),
            homepage: "https://github.com/VWS-Python/vws-cli".to_string(),
            python: "python@3".to_string(),
            tool: None,
            resources: Vec::new(),
        }
    }
}

impl FormulaGenerator for HomebrewFormula {
    fn generate(&self, request: &FormulaRequest) -> Result<String> {
        let name = formula_name(&request.recipe_filename)?;
        if request.archive_url.is_empty() {
            return Err(Error::InvalidInput("archive URL is empty".to_string()));
        }
        if request.head_url.is_empty() {
            return Err(Error::InvalidInput("head URL is empty".to_string()));
        }
        let tool = self.tool.as_deref().unwrap_or(name);
        for resource in &self.resources {
            if resource.name.is_empty() || resource.url.is_empty() || resource.sha256.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "resource '{}' needs a name, url and sha256",
                    resource.name
                )));
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "class {} < Formula", class_name(name));
        out.push_str("  include Language::Python::Virtualenv\n\n");
        let _ = writeln!(out, "  desc {}", ruby_string(&self.description));
        let _ = writeln!(out, "  homepage {}", ruby_string(&self.homepage));
        let _ = writeln!(out, "  url {}", ruby_string(&request.archive_url));
        if let Some(sha) = &request.archive_sha256 {
            let _ = writeln!(out, "  sha256 {}", ruby_string(sha));
        }
        let _ = writeln!(out, "  head {}, using: :git", ruby_string(&request.head_url));
        out.push('\n');
        let _ = writeln!(out, "  depends_on {}", ruby_string(&self.python));
        out.push('\n');
        for resource in &self.resources {
            let _ = writeln!(out, "  resource {} do", ruby_string(&resource.name));
            let _ = writeln!(out, "    url {}", ruby_string(&resource.url));
            let _ = writeln!(out, "    sha256 {}", ruby_string(&resource.sha256));
            out.push_str("  end\n\n");
        }
        out.push_str("  def install\n");
        out.push_str("    virtualenv_install_with_resources\n");
        out.push_str("  end\n\n");
        out.push_str("  test do\n");
        let _ = writeln!(
            out,
            "    system \"#{{bin}}/{}\", \"--version\"",
            ruby_escape(tool)
        );
        out.push_str("  end\n");
        out.push_str("end\n");
        Ok(out)
    }
}

/// Formula name from a recipe file name (`vws.rb` -> `vws`).
pub fn formula_name(recipe_filename: &str) -> Result<&str> {
    match recipe_filename.strip_suffix(".rb") {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(name),
        _ => Err(Error::InvalidInput(format!(
            "recipe filename '{}' must be a bare '<name>.rb'",
            recipe_filename
        ))),
    }
}

/// Homebrew's class naming: `my-tool` -> `MyTool`, `foo_bar` -> `FooBar`.
pub fn class_name(formula_name: &str) -> String {
    formula_name
        .split(['-', '_', '.', '@'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Double-quoted Ruby literal with interpolation disabled.
fn ruby_string(value: &str) -> String {
    format!("\"{}\"", ruby_escape(value))
}

fn ruby_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '#' => out.push_str("\\#"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
