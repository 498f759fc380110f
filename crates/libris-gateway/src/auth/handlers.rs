//! Account, login and user-administration endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use libris_core::access::{Permission, Role};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::middleware::{AuthState, OptionalAuth, RequireAuth};
use super::users::{PublicUser, User};
use super::AuthError;

/// Registration payload.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Login name: 3-50 letters, digits, `_`, `-` or `.`.
    #[validate(length(min = 3, max = 50), custom(function = "validate_username"))]
    pub username: String,
    /// Email address.
    #[validate(email)]
    pub email: String,
    /// Plain-text password.
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    /// Display name.
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        Ok(())
    } else {
        Err(ValidationError::new("username_charset"))
    }
}

/// Login payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

/// Successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Signed access token.
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
    /// The logged-in account.
    pub user: PublicUser,
}

/// Effective permissions of the caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct PermissionsResponse {
    /// Username, or `anonymous`.
    pub username: String,
    /// Effective role.
    pub role: Role,
    /// Whether a valid identity was presented.
    pub is_authenticated: bool,
    /// Granted permissions, sorted.
    pub permissions: Vec<Permission>,
}

/// Role change payload.
#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    /// New role name.
    pub role: String,
}

/// Status change payload.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    /// Whether the account may log in.
    pub is_active: bool,
}

/// Profile update payload.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    /// New email address.
    #[validate(email)]
    pub email: Option<String>,
    /// New display name.
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
}

fn validated<T: Validate>(payload: &T) -> Result<(), AuthError> {
    payload
        .validate()
        .map_err(|e| AuthError::Validation(e.to_string()))
}

/// `POST /auth/register`: create a reader account.
///
/// # Errors
///
/// Fails if registration is disabled, the payload is invalid, or the
/// username or email is taken.
pub async fn register(
    State(auth): State<Arc<AuthState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    if !auth.config.allow_registration {
        return Err(AuthError::RegistrationDisabled);
    }
    validated(&payload)?;

    let mut user = User::new(
        payload.username,
        payload.email.trim().to_lowercase(),
        &payload.password,
        Role::Reader,
    )?;
    user.full_name = payload.full_name;

    let user = auth.users.create(user)?;
    Ok((StatusCode::CREATED, Json(user.to_public())))
}

/// `POST /auth/login`: verify credentials, issue a token and set the access cookie.
///
/// # Errors
///
/// Fails on bad credentials, disabled accounts, or too many attempts.
pub async fn login(
    State(auth): State<Arc<AuthState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    if !auth.login_limiter.check(&payload.username) {
        tracing::warn!(username = %payload.username, "Login rate limit exceeded");
        return Err(AuthError::RateLimited);
    }

    let user = auth
        .users
        .get_by_username(&payload.username)?
        .ok_or(AuthError::InvalidCredentials)?;

    user.verify_password(&payload.password).inspect_err(|_| {
        tracing::info!(username = %payload.username, "Failed login attempt");
    })?;

    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    let user = auth.users.update_last_login(user.id)?;
    let issued = auth
        .tokens
        .issue_for_user(&user.username, user.role, Some(user.id))?;

    let cookie = Cookie::build((auth.config.cookie_name.clone(), issued.token.clone()))
        .path("/")
        .http_only(true)
        .secure(auth.config.cookie_secure)
        .same_site(SameSite::Lax)
        .build();

    tracing::info!(username = %user.username, role = %user.role, "User logged in");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            access_token: issued.token,
            token_type: "bearer".to_string(),
            expires_at: issued.expires_at,
            user: user.to_public(),
        }),
    ))
}

/// `POST /auth/logout`: clear the access cookie.
pub async fn logout(
    State(auth): State<Arc<AuthState>>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    let cookie = Cookie::build((auth.config.cookie_name.clone(), "")).path("/");
    (jar.remove(cookie), StatusCode::NO_CONTENT)
}

/// `GET /auth/me`: the caller's account.
pub async fn me(auth: RequireAuth) -> Json<PublicUser> {
    Json(auth.user.to_public())
}

/// `GET /auth/permissions`: the caller's effective permissions. Anonymous
/// callers get the guest set.
pub async fn permissions(
    State(auth): State<Arc<AuthState>>,
    caller: OptionalAuth,
) -> Json<PermissionsResponse> {
    let principal = caller.principal();
    let permissions = auth
        .access
        .permissions_for(principal.role)
        .iter()
        .copied()
        .collect();

    Json(PermissionsResponse {
        username: principal.username,
        role: principal.role,
        is_authenticated: principal.is_authenticated,
        permissions,
    })
}

/// `GET /admin/users`: every account.
///
/// # Errors
///
/// Fails if storage fails.
pub async fn list_users(
    State(auth): State<Arc<AuthState>>,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    let users = auth.users.list()?;
    Ok(Json(users.iter().map(User::to_public).collect()))
}

/// `PATCH /admin/users/{id}/role`: change an account's role.
///
/// # Errors
///
/// Fails on unknown role names or unknown accounts.
pub async fn set_role(
    State(auth): State<Arc<AuthState>>,
    Path(id): Path<i64>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<PublicUser>, AuthError> {
    let role = update
        .role
        .parse::<Role>()
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    let user = auth.users.set_role(id, role)?;
    Ok(Json(user.to_public()))
}

/// `PATCH /admin/users/{id}/status`: activate or deactivate an account.
///
/// # Errors
///
/// Fails on unknown accounts, or when callers try to deactivate themselves.
pub async fn set_status(
    State(auth): State<Arc<AuthState>>,
    caller: RequireAuth,
    Path(id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<PublicUser>, AuthError> {
    if caller.user_id() == id && !update.is_active {
        return Err(AuthError::Validation(
            "Cannot deactivate your own account".to_string(),
        ));
    }
    let user = auth.users.set_active(id, update.is_active)?;
    Ok(Json(user.to_public()))
}

/// `DELETE /admin/users/{id}`: remove an account.
///
/// # Errors
///
/// Fails on unknown accounts, or when callers try to delete themselves.
pub async fn delete_user(
    State(auth): State<Arc<AuthState>>,
    caller: RequireAuth,
    Path(id): Path<i64>,
) -> Result<StatusCode, AuthError> {
    if caller.user_id() == id {
        return Err(AuthError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }
    if auth.users.delete(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AuthError::UserNotFound(id.to_string()))
    }
}

/// `GET /users/{id}`: an account, visible to its owner or to user readers.
///
/// # Errors
///
/// 403 for other callers, 404 for unknown accounts.
pub async fn get_user(
    State(auth): State<Arc<AuthState>>,
    caller: RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<PublicUser>, AuthError> {
    auth.access
        .require_owner_or(Some(&caller.principal), id, Permission::ReadUsers)?;

    let user = auth
        .users
        .get(id)?
        .ok_or_else(|| AuthError::UserNotFound(id.to_string()))?;
    Ok(Json(user.to_public()))
}

/// `PATCH /users/{id}`: update email or display name, as the owner or with
/// `edit_users`.
///
/// # Errors
///
/// 403 for other callers, 404 for unknown accounts, 409 if the email is taken.
pub async fn update_profile(
    State(auth): State<Arc<AuthState>>,
    caller: RequireAuth,
    Path(id): Path<i64>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<PublicUser>, AuthError> {
    auth.access
        .require_owner_or(Some(&caller.principal), id, Permission::EditUsers)?;
    validated(&update)?;

    let mut user = auth
        .users
        .get(id)?
        .ok_or_else(|| AuthError::UserNotFound(id.to_string()))?;

    if let Some(email) = update.email {
        user.email = email.trim().to_lowercase();
    }
    if let Some(full_name) = update.full_name {
        user.full_name = Some(full_name).filter(|name| !name.trim().is_empty());
    }

    auth.users.update(&user)?;
    tracing::info!(user_id = id, by = %caller.username(), "Profile updated");
    Ok(Json(user.to_public()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            full_name: None,
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(registration("alice", "alice@example.org", "long-enough").validate().is_ok());
        assert!(registration("al", "alice@example.org", "long-enough").validate().is_err());
        assert!(registration("alice smith", "alice@example.org", "long-enough").validate().is_err());
        assert!(registration("alice", "not-an-email", "long-enough").validate().is_err());
        assert!(registration("alice", "alice@example.org", "short").validate().is_err());
    }

    #[test]
    fn test_profile_validation() {
        let ok = ProfileUpdate {
            email: Some("new@example.org".to_string()),
            full_name: None,
        };
        assert!(ok.validate().is_ok());

        let bad = ProfileUpdate {
            email: Some("nope".to_string()),
            full_name: None,
        };
        assert!(matches!(validated(&bad), Err(AuthError::Validation(_))));
    }
}
