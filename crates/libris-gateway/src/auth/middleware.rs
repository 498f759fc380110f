//! Authentication middleware for axum.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use libris_core::access::{AccessControl, AccessDenied, Principal, Role};
use libris_core::config::{AuthConfig, Config};
use libris_core::token::{TokenError, TokenService};
use serde::Serialize;

use super::AuthError;
use super::users::{User, UserStore};
use crate::middleware::LoginRateLimiter;

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    /// Token issuer and verifier.
    pub tokens: TokenService,
    /// Permission evaluator.
    pub access: AccessControl,
    /// User store.
    pub users: UserStore,
    /// Login attempt limiter.
    pub login_limiter: LoginRateLimiter,
}

impl AuthState {
    /// Create a new auth state.
    #[must_use]
    pub fn new(config: AuthConfig, access: AccessControl, users: UserStore) -> Self {
        let tokens = TokenService::new(&config.signing_key(), config.token_ttl());
        let login_limiter = LoginRateLimiter::new(config.login_attempts_per_minute);

        Self {
            config,
            tokens,
            access,
            users,
            login_limiter,
        }
    }

    /// Initialize auth state from the application config, opening the user
    /// store under its data directory.
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or the store cannot be opened.
    pub fn initialize(config: &Config) -> Result<Self, AuthError> {
        config
            .validate()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        let matrix = config
            .permission_matrix()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| AuthError::Storage(format!("Failed to create data dir: {e}")))?;
        let users = UserStore::open(&data_dir)?;

        tracing::debug!(data_dir = %data_dir.display(), users = users.count(), "Auth state ready");

        Ok(Self::new(
            config.auth.clone(),
            AccessControl::new(matrix),
            users,
        ))
    }

    /// Raw token from the request: `Authorization: Bearer` first, then the
    /// access cookie.
    #[must_use]
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(TokenService::extract_bearer);

        if let Some(token) = bearer {
            return Some(token.to_string());
        }

        CookieJar::from_headers(headers)
            .get(&self.config.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Verify `token` and load the account it names.
    ///
    /// The principal's role comes from the stored account, not the token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Token`] if the token fails verification or has no subject
    /// - [`AuthError::Access`] (`Unauthenticated`) if the account no longer exists
    /// - [`AuthError::InactiveUser`] if the account is disabled
    pub fn authenticate(&self, token: &str) -> Result<RequireAuth, AuthError> {
        let claims = self.tokens.verify(token).inspect_err(|e| {
            tracing::debug!("Token rejected: {e}");
        })?;

        let username = claims
            .subject()
            .ok_or_else(|| TokenError::MalformedToken("missing sub claim".to_string()))?;

        let user = self
            .users
            .get_by_username(username)?
            .filter(|user| claims.user_id().is_none_or(|id| id == user.id))
            .ok_or_else(|| {
                tracing::debug!(%username, "Token names an unknown account");
                AuthError::Access(AccessDenied::Unauthenticated)
            })?;

        if !user.is_active {
            tracing::debug!(%username, "Token for disabled account");
            return Err(AuthError::InactiveUser);
        }

        Ok(RequireAuth::from_user(user))
    }

    /// Resolve the request's identity. `Ok(None)` when no token was presented.
    ///
    /// # Errors
    ///
    /// See [`Self::authenticate`].
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Option<RequireAuth>, AuthError> {
        self.token_from_headers(headers)
            .map(|token| self.authenticate(&token))
            .transpose()
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("user_count", &self.users.count())
            .finish_non_exhaustive()
    }
}

/// Extractor for authenticated requests.
///
/// Use this in handler parameters to require authentication. Behind a
/// [`Gate`](super::Gate) the identity resolved by the gate is reused.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    /// Identity used for authorization checks.
    pub principal: Principal,
    /// The stored account.
    pub user: User,
}

impl RequireAuth {
    fn from_user(user: User) -> Self {
        Self {
            principal: Principal::authenticated(&user.username, user.role, Some(user.id)),
            user,
        }
    }

    /// Get the account id.
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        self.user.id
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Get the user role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.user.role
    }
}

/// Error response for auth failures.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Self::Token(TokenError::Encoding(_)) | Self::Storage(_) | Self::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            Self::Token(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::Access(AccessDenied::Unauthenticated) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated")
            }
            Self::Access(AccessDenied::Forbidden { .. }) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::InactiveUser => (StatusCode::FORBIDDEN, "inactive_user"),
            Self::RegistrationDisabled => (StatusCode::FORBIDDEN, "registration_disabled"),
            Self::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            Self::UserExists(_) => (StatusCode::CONFLICT, "user_exists"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        };

        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(AuthErrorResponse { error, code })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Extractor implementation for `RequireAuth`.
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<Self>() {
            return Ok(auth.clone());
        }

        let auth_state = Arc::<AuthState>::from_ref(state);
        match auth_state.resolve(&parts.headers) {
            Ok(Some(auth)) => Ok(auth),
            Ok(None) => Err(AuthError::Access(AccessDenied::Unauthenticated).into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Extractor for optional authentication.
///
/// Any failure to establish an identity (no token, bad token, disabled
/// account) yields `None`, i.e. an anonymous guest.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<RequireAuth>);

impl OptionalAuth {
    /// The resolved principal, or an anonymous guest.
    #[must_use]
    pub fn principal(&self) -> Principal {
        self.0
            .as_ref()
            .map_or_else(Principal::anonymous, |auth| auth.principal.clone())
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<RequireAuth>() {
            return Ok(Self(Some(auth.clone())));
        }

        let auth_state = Arc::<AuthState>::from_ref(state);
        let auth = auth_state.resolve(&parts.headers).unwrap_or_else(|e| {
            tracing::debug!("Treating request as anonymous: {e}");
            None
        });
        Ok(Self(auth))
    }
}
