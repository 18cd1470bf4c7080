//! Configuration for brewcheck.
//!
//! Settings live in a KDL file (`brewcheck.kdl` in the working directory, or
//! `~/.config/brewcheck/config.kdl`) and can be overridden by CLI flags.
//! Use [`resolve_settings`] to get the effective values with their sources.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, PROJECT_CONFIG_FILE, Resolved, Settings, ValueSource, find_config_file,
    resolve_settings, resolve_with, system_config_path,
};
pub use schema::{BrewcheckConfig, OutputFormat};
