//! # Libris Gateway
//!
//! HTTP gateway: account registration and login, principal resolution from
//! bearer header or cookie, and permission-gated user administration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and authorization.
pub mod auth;
mod middleware;
mod server;

pub use auth::{AuthError, AuthState, Gate, PublicUser, Rule, User, UserStore};
pub use middleware::LoginRateLimiter;
pub use server::{Gateway, router};

use libris_core::config::Config;

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: Config) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
