//! Serve command - run the HTTP gateway.

use anyhow::Result;
use libris_core::config::Config;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
}

/// Start the gateway and block until Ctrl-C.
///
/// # Errors
///
/// Returns error if the gateway cannot start.
pub async fn run_serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    if config.auth.secret_key.is_none() {
        ui::warning("No auth.secretKey configured; tokens will not survive a restart");
    }

    ui::header("Libris Gateway");
    ui::kv("Address", &format!("http://{}:{}", config.server.bind, config.server.port));
    ui::kv("Data", &config.data_dir().display().to_string());
    println!();

    libris_gateway::start(config).await?;
    Ok(())
}
