//! Per-request identity.

use serde::{Deserialize, Serialize};

use super::role::Role;
use crate::token::Claims;

/// Name reported for requests without a usable identity.
pub const ANONYMOUS: &str = "anonymous";

/// Identity resolved for a single request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Login name (or [`ANONYMOUS`]).
    pub username: String,
    /// Effective role.
    pub role: Role,
    /// Numeric account id, if the identity maps to a stored account.
    pub user_id: Option<i64>,
    /// Whether a valid credential was presented.
    pub is_authenticated: bool,
}

impl Principal {
    /// An unauthenticated guest.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            username: ANONYMOUS.to_string(),
            role: Role::Guest,
            user_id: None,
            is_authenticated: false,
        }
    }

    /// An authenticated identity.
    #[must_use]
    pub fn authenticated(username: impl Into<String>, role: Role, user_id: Option<i64>) -> Self {
        Self {
            username: username.into(),
            role,
            user_id,
            is_authenticated: true,
        }
    }

    /// Build a principal straight from verified token claims.
    ///
    /// Returns `None` when the claims carry no subject. An absent or unknown
    /// `role` claim yields a guest.
    #[must_use]
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        let username = claims.subject()?;
        Some(Self::authenticated(
            username,
            Role::coerce(claims.role()),
            claims.user_id(),
        ))
    }

    /// Whether this principal owns a resource belonging to `owner_id`.
    ///
    /// Principals without an account id own nothing.
    #[must_use]
    pub fn owns(&self, owner_id: i64) -> bool {
        self.user_id == Some(owner_id)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}
