//! Authentication settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::token::SigningKey;

/// Default access token lifetime in minutes.
const DEFAULT_TOKEN_TTL_MINUTES: u64 = 30;
/// Default cookie carrying the access token.
const DEFAULT_COOKIE_NAME: &str = "access_token";
/// Default login attempts allowed per username per minute.
const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;
/// Longest accepted access token lifetime: one year.
pub const MAX_TOKEN_TTL_MINUTES: u64 = 366 * 24 * 60;

/// Authentication configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Token signing secret. A random one is generated at startup if unset.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Access token lifetime in minutes.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: u64,

    /// Name of the cookie carrying the access token.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Mark the access cookie `Secure`.
    #[serde(default)]
    pub cookie_secure: bool,

    /// Allow self-registration of reader accounts.
    #[serde(default = "default_true")]
    pub allow_registration: bool,

    /// Login attempts allowed per username per minute.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_MINUTES
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_login_attempts() -> u32 {
    DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            token_ttl_minutes: default_token_ttl(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
            allow_registration: true,
            login_attempts_per_minute: default_login_attempts(),
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Token lifetime as a `Duration`.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_minutes.saturating_mul(60))
    }

    /// The configured signing key, or a freshly generated one.
    ///
    /// A generated key invalidates every token on restart.
    #[must_use]
    pub fn signing_key(&self) -> SigningKey {
        match &self.secret_key {
            Some(secret) => SigningKey::parse(secret).unwrap_or_else(|e| {
                tracing::warn!("Secret key is not valid hex ({e}); using it as raw text");
                SigningKey::from_secret(secret)
            }),
            None => {
                tracing::warn!(
                    "No secret key configured; generated an ephemeral one. \
                     Tokens will not survive a restart."
                );
                SigningKey::generate()
            }
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field("allow_registration", &self.allow_registration)
            .field("login_attempts_per_minute", &self.login_attempts_per_minute)
            .finish()
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the signing secret.
    #[must_use]
    pub fn secret_key(mut self, secret: impl Into<String>) -> Self {
        self.config.secret_key = Some(secret.into());
        self
    }

    /// Set token lifetime in minutes.
    #[must_use]
    pub fn token_ttl_minutes(mut self, minutes: u64) -> Self {
        self.config.token_ttl_minutes = minutes;
        self
    }

    /// Set the access cookie name.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.config.cookie_name = name.into();
        self
    }

    /// Set whether the access cookie is `Secure`.
    #[must_use]
    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.config.cookie_secure = secure;
        self
    }

    /// Set whether self-registration is allowed.
    #[must_use]
    pub fn allow_registration(mut self, allow: bool) -> Self {
        self.config.allow_registration = allow;
        self
    }

    /// Set login attempts per username per minute.
    #[must_use]
    pub fn login_attempts_per_minute(mut self, attempts: u32) -> Self {
        self.config.login_attempts_per_minute = attempts;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert!(config.secret_key.is_none());
        assert_eq!(config.token_ttl_minutes, 30);
        assert_eq!(config.cookie_name, "access_token");
        assert!(config.allow_registration);
    }

    #[test]
    fn test_builder() {
        let config = AuthConfig::builder()
            .secret_key("0123456789abcdef")
            .token_ttl_minutes(5)
            .cookie_name("lib_session")
            .allow_registration(false)
            .build();

        assert_eq!(config.secret_key.as_deref(), Some("0123456789abcdef"));
        assert_eq!(config.token_ttl(), Duration::from_secs(300));
        assert_eq!(config.cookie_name, "lib_session");
        assert!(!config.allow_registration);
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = AuthConfig::builder().secret_key("hunter2hunter2hunter2").build();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_signing_key() {
        let configured = AuthConfig::builder().secret_key("0123456789abcdef").build();
        assert_eq!(configured.signing_key().len(), 16);
        assert_eq!(AuthConfig::default().signing_key().len(), 32);

        let hex = AuthConfig::builder()
            .secret_key("hex:000102030405060708090a0b0c0d0e0f1011")
            .build();
        assert_eq!(hex.signing_key().len(), 18);
    }
}
