//! Signed, expiring identity tokens.
//!
//! Tokens use the JWT compact form `header.payload.signature`: URL-safe base64
//! without padding, HMAC-SHA256 over `header.payload` with the server secret.
//! Signature comparison is constant time.
//!
//! Verification is a pure function of the token, the secret and the supplied
//! clock reading; the `*_at` variants take the time explicitly.

mod claims;
mod key;

pub use claims::{Claims, EMAIL, EXPIRES_AT, ISSUED_AT, ROLE, SUBJECT, USER_ID};
pub use key::{HEX_PREFIX, MIN_SECRET_LEN, SigningKey};

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::Role;

/// Token failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Wrong segment count, undecodable base64/JSON, or badly typed claim.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Signature does not match the payload.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is structurally valid but past its `exp`.
    #[error("Token expired")]
    Expired,

    /// Token could not be produced.
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// A freshly issued token with its validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Encoded token.
    pub token: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies tokens under one secret.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    /// Create a service signing with `key`; `ttl` is the default lifetime used
    /// by [`Self::issue_for_user`].
    #[must_use]
    pub fn new(key: &SigningKey, ttl: Duration) -> Self {
        // Expiry is checked by hand against the caller's clock, and a missing
        // `exp` must not be rejected here.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key.expose()),
            decoding_key: DecodingKey::from_secret(key.expose()),
            header: Header::new(Algorithm::HS256),
            validation,
            ttl,
        }
    }

    /// Default token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `claims` with `iat = now` and `exp = now + ttl` merged in.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if `ttl` overflows or encoding fails.
    pub fn issue(&self, claims: Claims, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(claims, ttl, Utc::now())
    }

    /// [`Self::issue`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if `ttl` overflows or encoding fails.
    pub fn issue_at(
        &self,
        mut claims: Claims,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let exp = expiry(now, ttl)?;
        claims.insert(EXPIRES_AT, exp.timestamp());
        claims.insert(ISSUED_AT, now.timestamp());

        encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Issue a login token `{sub, role, user_id}` with the default lifetime.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails.
    pub fn issue_for_user(
        &self,
        username: &str,
        role: Role,
        user_id: Option<i64>,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let claims = Claims::for_user(username, role.as_str(), user_id);
        let token = self.issue_at(claims, self.ttl, now)?;

        tracing::debug!(%username, %role, "Issued access token");

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: expiry(now, self.ttl)?,
        })
    }

    /// Verify `token` against the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` as of `now` and return its claims.
    ///
    /// A token without `exp` never expires.
    ///
    /// # Errors
    ///
    /// - [`TokenError::MalformedToken`]: not three segments, undecodable, or
    ///   `exp`/`iat` not an integer
    /// - [`TokenError::InvalidSignature`]: signature mismatch
    /// - [`TokenError::Expired`]: `exp` is before `now`
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let segments = token.split('.').count();
        if segments != 3 {
            return Err(TokenError::MalformedToken(format!(
                "expected 3 segments, found {segments}"
            )));
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(classify)?
            .claims;

        if claims.contains(ISSUED_AT) && claims.issued_at().is_none() {
            return Err(TokenError::MalformedToken("iat is not an integer".into()));
        }

        match claims.get(EXPIRES_AT) {
            None => {
                tracing::warn!(
                    sub = claims.subject().unwrap_or_default(),
                    "Token has no exp claim, accepting as non-expiring"
                );
            }
            Some(_) => {
                let exp = claims
                    .expires_at()
                    .ok_or_else(|| TokenError::MalformedToken("exp is not an integer".into()))?;
                if exp < now.timestamp() {
                    return Err(TokenError::Expired);
                }
            }
        }

        Ok(claims)
    }

    /// Extract the token from an `Authorization` header value.
    ///
    /// Accepts `Bearer <token>` with any casing of the scheme.
    #[must_use]
    pub fn extract_bearer(header: &str) -> Option<&str> {
        let (scheme, token) = header.trim().split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.header.alg)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, TokenError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| TokenError::Encoding(format!("TTL out of range: {ttl:?}")))
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::MalformedToken(err.to_string()),
    }
}
