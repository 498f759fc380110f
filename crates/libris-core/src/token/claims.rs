//! Token claim sets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Subject claim (username).
pub const SUBJECT: &str = "sub";
/// Role claim.
pub const ROLE: &str = "role";
/// Numeric account id claim.
pub const USER_ID: &str = "user_id";
/// Email claim.
pub const EMAIL: &str = "email";
/// Issued-at claim (unix seconds).
pub const ISSUED_AT: &str = "iat";
/// Expiry claim (unix seconds).
pub const EXPIRES_AT: &str = "exp";

/// Flat key/value claim map carried in a token payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims for a logged-in account: `sub`, `role` and optionally `user_id`.
    #[must_use]
    pub fn for_user(username: &str, role: &str, user_id: Option<i64>) -> Self {
        let mut claims = Self::new().with(SUBJECT, username).with(ROLE, role);
        if let Some(id) = user_id {
            claims.insert(USER_ID, id);
        }
        claims
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a claim, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Raw claim value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get(SUBJECT).and_then(Value::as_str)
    }

    /// `role` claim, unparsed.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.get(ROLE).and_then(Value::as_str)
    }

    /// `user_id` claim.
    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        self.get(USER_ID).and_then(Value::as_i64)
    }

    /// `email` claim.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL).and_then(Value::as_str)
    }

    /// `iat` claim.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.get(ISSUED_AT).and_then(Value::as_i64)
    }

    /// `exp` claim.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.get(EXPIRES_AT).and_then(Value::as_i64)
    }
}
