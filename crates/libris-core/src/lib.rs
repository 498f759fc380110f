//! # Libris Core
//!
//! Authorization and identity tokens for the Libris library service.
//!
//! This crate provides:
//! - Roles, permissions and the role → permission table
//! - A stateless access-control evaluator
//! - Signed, expiring identity tokens (HS256)
//! - Configuration loading and validation (JSON5 format)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod config;
pub mod token;

pub use access::{AccessControl, AccessDenied, AccessError, Permission, PermissionMatrix, Principal, Role};
pub use config::{Config, ConfigError};
pub use token::{Claims, IssuedToken, SigningKey, TokenError, TokenService};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::access::{AccessControl, AccessDenied, Permission, Principal, Role};
    pub use crate::config::Config;
    pub use crate::token::{Claims, TokenError, TokenService};
}
