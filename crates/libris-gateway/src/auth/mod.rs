//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - User accounts stored in sled
//! - Principal resolution from bearer header or cookie
//! - Permission gates for routes
//! - Account and login handlers
//! - First-run admin setup

mod gate;
pub mod handlers;
mod middleware;
/// First-run admin setup.
pub mod setup;
mod users;

pub use gate::{Gate, Rule, enforce};
pub use middleware::{AuthState, OptionalAuth, RequireAuth};
pub use users::{PublicUser, User, UserStore};

use libris_core::access::AccessDenied;
use libris_core::token::TokenError;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials provided.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account exists but is deactivated.
    #[error("Account is disabled")]
    InactiveUser,

    /// User not found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// User already exists.
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Token error (expired, invalid, etc.).
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Authorization check refused the request.
    #[error(transparent)]
    Access(#[from] AccessDenied),

    /// Request payload failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Self-registration is switched off.
    #[error("Registration is disabled")]
    RegistrationDisabled,

    /// Too many attempts.
    #[error("Too many login attempts, try again later")]
    RateLimited,

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}
