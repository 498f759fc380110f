//! CLI command implementations.

pub mod admin;
pub mod config;
pub mod roles;
pub mod serve;
pub mod token;

pub use admin::run_admin;
pub use config::run_config;
pub use roles::run_roles;
pub use serve::run_serve;
pub use token::run_token;

use std::path::Path;

use anyhow::Context;
use libris_core::config::Config;

/// Load the config file (or defaults), apply `LIBRIS_*` overrides and
/// validate the result.
///
/// # Errors
///
/// Returns error if the file cannot be read or the result is invalid.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };

    let config = config.with_env_overrides();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
