//! Brewcheck CLI - build a Homebrew formula from a git checkout and prove it installs.

use brewcheck::archive::repository_root;
use brewcheck::cli::{Cli, Commands, ConfigCommands};
use brewcheck::config::{OutputFormat, Settings, resolve_settings};
use brewcheck::container::DockerCli;
use brewcheck::errors;
use brewcheck::formula::HomebrewFormula;
use brewcheck::process::SystemRunner;
use brewcheck::report::{CommandResult, ScenarioKind, SettingsReport};
use brewcheck::scenario::{self, ScenarioContext};
use brewcheck::Result;
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("{}", errors::render(&e));
        process::exit(1);
    }
}

/// Log to stderr. `RUST_LOG` wins over -v/-q.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir()?;
    let settings = resolve_settings(&cli.overrides(), &cwd)?;
    let human = settings.output_format.value == OutputFormat::Human;

    let kind = match &cli.command {
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            output(&SettingsReport::from(&settings), human);
            return Ok(());
        }
        Commands::Archive { .. } => ScenarioKind::Archive,
        Commands::Local { .. } => ScenarioKind::Local,
        Commands::Install { .. } => ScenarioKind::Install,
    };

    let runner = SystemRunner::new();
    let repo = repository_root(&runner, cli.repo_path.as_deref().unwrap_or(&cwd))?;
    let keep_temp = match &cli.command {
        Commands::Install { keep_work_dir, .. } => *keep_work_dir,
        _ => true,
    };
    let work = WorkDir::new(cli.work_dir(), keep_temp)?;
    tracing::debug!(repo = %repo.display(), work_dir = %work.path().display(), "starting");

    let ctx = ScenarioContext::from_settings(&settings, &repo, work.path());
    let generator = formula_generator(&settings);

    let report = match kind {
        ScenarioKind::Archive => scenario::run_archive(&ctx, &runner)?,
        ScenarioKind::Local => scenario::run_local_smoke(&ctx, &runner, &generator)?,
        ScenarioKind::Install => {
            let runtime = DockerCli::new(settings.runtime.value.clone());
            scenario::run_container_install(&ctx, &runner, &generator, &runtime)?
        }
    };
    output(&report, human);
    Ok(())
}

fn formula_generator(settings: &Settings) -> HomebrewFormula {
    HomebrewFormula {
        tool: Some(settings.tool.value.clone()),
        resources: settings.resources.clone(),
        ..HomebrewFormula::default()
    }
}

fn output<T: CommandResult>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Where a run writes its archive and formula.
enum WorkDir {
    /// Given with `--work-dir`; never deleted
    Given(PathBuf),
    /// Fresh temp directory, deleted on drop
    Temp(TempDir),
}

impl WorkDir {
    /// Use `given`, or create a temp directory. `keep_temp` leaves the temp
    /// directory behind so the archive and formula outlive the process.
    fn new(given: Option<&PathBuf>, keep_temp: bool) -> Result<Self> {
        if let Some(path) = given {
            std::fs::create_dir_all(path)?;
            return Ok(Self::Given(std::path::absolute(path)?));
        }
        let dir = tempfile::Builder::new().prefix("brewcheck-").tempdir()?;
        if keep_temp {
            return Ok(Self::Given(dir.keep()));
        }
        Ok(Self::Temp(dir))
    }

    fn path(&self) -> &Path {
        match self {
            Self::Given(path) => path,
            Self::Temp(dir) => dir.path(),
        }
    }
}
