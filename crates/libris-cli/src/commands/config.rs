//! Config command - inspect and validate the effective configuration.

use std::path::Path;

use anyhow::Result;
use libris_core::config::Config;
use serde_json::Value;

use crate::ui;

/// Config actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration with secrets masked.
    Show,
    /// Report whether the configuration loads and validates.
    Validate,
    /// Print the config file location.
    Path,
}

/// Run the config command against an already attempted load.
///
/// # Errors
///
/// Returns error if the configuration failed to load or validate.
pub fn run_config(
    loaded: Result<Config>,
    path: Option<&Path>,
    action: ConfigAction,
) -> Result<()> {
    let path = path.map_or_else(Config::default_path, Path::to_path_buf);

    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
            if !path.exists() {
                ui::info("File does not exist; built-in defaults apply");
            }
        }
        ConfigAction::Validate => match loaded {
            Ok(config) => {
                ui::success(&format!("Configuration is valid ({})", path.display()));
                ui::kv("Data dir", &config.data_dir().display().to_string());
                if config.auth.secret_key.is_none() {
                    ui::warning("auth.secretKey is unset; a random key is generated per run");
                }
            }
            Err(e) => {
                ui::error(&format!("{e:#}"));
                return Err(e);
            }
        },
        ConfigAction::Show => {
            let config = loaded?;
            println!("{}", serde_json::to_string_pretty(&masked(&config)?)?);
        }
    }

    Ok(())
}

/// The configuration as JSON with `auth.secretKey` replaced.
fn masked(config: &Config) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(secret) = value.pointer_mut("/auth/secretKey") {
        if !secret.is_null() {
            *secret = Value::String("********".to_string());
        }
    }
    Ok(value)
}
