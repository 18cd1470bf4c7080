//! CLI argument definitions for brewcheck.

use crate::config::{ConfigOverrides, OutputFormat};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Brewcheck - build a Homebrew formula from a git checkout and prove it installs.
///
/// Start with `brewcheck local` to see the formula, then `brewcheck install`
/// to install it inside a Linuxbrew container.
#[derive(Parser, Debug)]
#[command(name = "brewcheck")]
#[command(author, version, long_version = LONG_VERSION, about = "Build a Homebrew formula from a git checkout and verify it installs", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Package the git checkout containing <path> instead of the current directory.
    #[arg(short = 'C', long = "repo", global = true, env = "BREWCHECK_REPO")]
    pub repo_path: Option<PathBuf>,

    /// Read settings from this KDL file instead of searching for one.
    #[arg(long = "config", global = true, env = "BREWCHECK_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create `<version>.tar.gz` from HEAD with a `<version>/` prefix
    Archive {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Build the archive and write a formula installing from it (no install)
    Local {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        formula: FormulaArgs,
    },

    /// Install the formula inside a fresh Linuxbrew container
    ///
    /// Pulls the image, mounts the archive and formula, runs
    /// `brew install` followed by `<tool> --version`, and fails unless the
    /// container exits with status 0. The container is always removed.
    Install {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        formula: FormulaArgs,

        /// Container CLI to drive (docker or podman)
        #[arg(long)]
        runtime: Option<String>,

        /// Image repository, e.g. linuxbrew/linuxbrew
        #[arg(long)]
        image: Option<String>,

        /// Image tag
        #[arg(long)]
        tag: Option<String>,

        /// Seconds to wait for the install before giving up
        #[arg(long = "timeout", value_name = "SECS")]
        timeout_secs: Option<u64>,

        /// Keep the temporary work directory after the run
        #[arg(long)]
        keep_work_dir: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Options shared by every command that builds an archive.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Version token used for the archive name and prefix
    #[arg(long = "archive-version", value_name = "VERSION")]
    pub version: Option<String>,

    /// Directory for the archive and formula (default: a new temp directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

/// Options controlling the generated formula.
#[derive(Args, Debug, Clone, Default)]
pub struct FormulaArgs {
    /// Recipe file name, e.g. vws.rb
    #[arg(long)]
    pub formula: Option<String>,

    /// Executable checked with `--version` after install
    #[arg(long)]
    pub tool: Option<String>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings and where each value came from
    Show,
}

impl Cli {
    /// Settings given on the command line, for the config resolver.
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            config_file: self.config_file.clone(),
            output_format: self.human_readable.then_some(OutputFormat::Human),
            ..ConfigOverrides::default()
        };

        let (build, formula) = match &self.command {
            Commands::Archive { build } => (Some(build), None),
            Commands::Local { build, formula } => (Some(build), Some(formula)),
            Commands::Install {
                build,
                formula,
                runtime,
                image,
                tag,
                timeout_secs,
                ..
            } => {
                overrides.runtime = runtime.clone();
                overrides.image = image.clone();
                overrides.tag = tag.clone();
                overrides.timeout_secs = *timeout_secs;
                (Some(build), Some(formula))
            }
            Commands::Config { .. } => (None, None),
        };
        if let Some(build) = build {
            overrides.version = build.version.clone();
        }
        if let Some(formula) = formula {
            overrides.formula = formula.formula.clone();
            overrides.tool = formula.tool.clone();
        }
        overrides
    }

    /// Work directory requested with `--work-dir`, if any.
    pub fn work_dir(&self) -> Option<&PathBuf> {
        match &self.command {
            Commands::Archive { build }
            | Commands::Local { build, .. }
            | Commands::Install { build, .. } => build.work_dir.as_ref(),
            Commands::Config { .. } => None,
        }
    }
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("BREWCHECK_GIT_COMMIT"),
    ", built ",
    env!("BREWCHECK_BUILD_TIMESTAMP"),
    ")"
);

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_overrides() {
        let cli = Cli::parse_from([
            "brewcheck",
            "install",
            "--runtime",
            "podman",
            "--tag",
            "4.2.0",
            "--timeout",
            "60",
            "--tool",
            "vws",
            "--archive-version",
            "2",
            "-H",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.runtime.as_deref(), Some("podman"));
        assert_eq!(overrides.image, None);
        assert_eq!(overrides.tag.as_deref(), Some("4.2.0"));
        assert_eq!(overrides.timeout_secs, Some(60));
        assert_eq!(overrides.tool.as_deref(), Some("vws"));
        assert_eq!(overrides.version.as_deref(), Some("2"));
        assert_eq!(overrides.output_format, Some(OutputFormat::Human));
    }

    #[test]
    fn test_json_is_not_forced() {
        let cli = Cli::parse_from(["brewcheck", "local"]);
        assert_eq!(cli.overrides().output_format, None);
        assert!(cli.work_dir().is_none());
    }

    #[test]
    fn test_work_dir() {
        let cli = Cli::parse_from(["brewcheck", "archive", "--work-dir", "/tmp/out"]);
        assert_eq!(cli.work_dir(), Some(&PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_verbose_count() {
        let cli = Cli::parse_from(["brewcheck", "-vv", "config", "show"]);
        assert_eq!(cli.verbose, 2);
        assert!(Cli::try_parse_from(["brewcheck", "-v", "-q", "config", "show"]).is_err());
    }
}
