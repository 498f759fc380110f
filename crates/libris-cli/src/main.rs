//! Libris CLI - serve the gateway, mint tokens and manage accounts.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use libris_core::config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "libris")]
#[command(about = "Libris - role-based access control and tokens for a digital library")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.libris/libris.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Issue or verify access tokens
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Show the permission table
    Roles {
        /// Only show this role
        role: Option<String>,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },

    /// User management (admin commands)
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Sign a token for a subject
    Issue {
        /// Subject (username)
        #[arg(long)]
        sub: String,

        /// Role claim
        #[arg(long, default_value = "reader")]
        role: String,

        /// Numeric user id claim
        #[arg(long)]
        user_id: Option<i64>,

        /// Lifetime in minutes (defaults to auth.tokenTtlMinutes)
        #[arg(long)]
        ttl_minutes: Option<u64>,

        /// Extra claim as key=value (repeatable)
        #[arg(long = "claim", value_name = "KEY=VALUE")]
        claims: Vec<String>,
    },

    /// Verify a token and print its claims
    Verify {
        /// Encoded token
        token: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate configuration
    Validate,

    /// Print the config file location
    Path,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new user
    Create {
        /// Username for the new user
        #[arg(long)]
        username: String,

        /// Email address (defaults to <username>@localhost)
        #[arg(long)]
        email: Option<String>,

        /// Password (or use --generate-password)
        #[arg(long)]
        password: Option<String>,

        /// User role: guest, reader, librarian, or admin
        #[arg(long, default_value = "admin")]
        role: String,

        /// Generate a random password
        #[arg(long)]
        generate_password: bool,
    },

    /// List all users
    List,

    /// Change a user's role
    SetRole {
        /// Username of the user
        #[arg(long)]
        username: String,

        /// New role
        #[arg(long)]
        role: String,
    },

    /// Reset a user's password
    ResetPassword {
        /// Username of the user
        #[arg(long)]
        username: String,
    },

    /// Enable a user account
    Enable {
        /// Username of the user
        #[arg(long)]
        username: String,
    },

    /// Disable a user account
    Disable {
        /// Username of the user
        #[arg(long)]
        username: String,
    },

    /// Delete a user
    Delete {
        /// Username of the user to delete
        #[arg(long)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `config validate` reports load errors itself.
    let loaded = commands::load_config(cli.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_logging(cli.verbose, &logging.level, logging.format);

    match cli.command {
        Commands::Serve { port, bind } => {
            commands::run_serve(loaded?, commands::serve::ServeArgs { port, bind }).await?;
        }

        Commands::Token { action } => {
            let action = match action {
                TokenCommands::Issue {
                    sub,
                    role,
                    user_id,
                    ttl_minutes,
                    claims,
                } => commands::token::TokenAction::Issue {
                    sub,
                    role,
                    user_id,
                    ttl_minutes,
                    claims,
                },
                TokenCommands::Verify { token } => commands::token::TokenAction::Verify { token },
            };
            commands::run_token(&loaded?, action)?;
        }

        Commands::Roles { role } => {
            commands::run_roles(&loaded?, role.as_deref())?;
        }

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Path) => commands::config::ConfigAction::Path,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(loaded, cli.config.as_deref(), action)?;
        }

        Commands::Admin { action, data_dir } => {
            let args = commands::admin::AdminArgs {
                action: match action {
                    AdminCommands::Create {
                        username,
                        email,
                        password,
                        role,
                        generate_password,
                    } => commands::admin::AdminAction::Create {
                        username,
                        email,
                        password,
                        role,
                        generate_password,
                    },
                    AdminCommands::List => commands::admin::AdminAction::List,
                    AdminCommands::SetRole { username, role } => {
                        commands::admin::AdminAction::SetRole { username, role }
                    }
                    AdminCommands::ResetPassword { username } => {
                        commands::admin::AdminAction::ResetPassword { username }
                    }
                    AdminCommands::Enable { username } => {
                        commands::admin::AdminAction::Enable { username }
                    }
                    AdminCommands::Disable { username } => {
                        commands::admin::AdminAction::Disable { username }
                    }
                    AdminCommands::Delete { username } => {
                        commands::admin::AdminAction::Delete { username }
                    }
                },
                data_dir,
            };
            commands::run_admin(&loaded?, args)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins, then `-v`, then `logging.level` from the config file.
/// Logs go to stderr so `token issue` output stays pipeable.
fn init_logging(verbose: bool, level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
        }
    });

    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_token_issue() {
        let cli = Cli::try_parse_from([
            "libris", "token", "issue", "--sub", "alice", "--role", "librarian", "--claim",
            "email=a@example.org",
        ])
        .unwrap();

        match cli.command {
            Commands::Token {
                action: TokenCommands::Issue { sub, role, claims, .. },
            } => {
                assert_eq!(sub, "alice");
                assert_eq!(role, "librarian");
                assert_eq!(claims, vec!["email=a@example.org".to_string()]);
            }
            _ => panic!("expected token issue"),
        }
    }
}
