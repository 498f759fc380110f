//! Route-level permission gates.
//!
//! A [`Gate`] pairs the shared [`AuthState`] with a [`Rule`] and is installed
//! with [`axum::middleware::from_fn_with_state`] and [`enforce`]:
//!
//! ```ignore
//! let gate = Gate::new(auth.clone(), Rule::Permission(Permission::ReadUsers));
//! Router::new().route(
//!     "/admin/users",
//!     get(list_users).route_layer(from_fn_with_state(gate, enforce)),
//! );
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::Response,
};
use libris_core::access::{AccessDenied, Permission, Principal, Role};

use super::AuthError;
use super::middleware::{AuthState, RequireAuth};

/// What a gated route demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Any authenticated identity.
    Authenticated,
    /// A single permission.
    Permission(Permission),
    /// At least one of these permissions.
    AnyPermission(Vec<Permission>),
    /// Every one of these permissions.
    AllPermissions(Vec<Permission>),
    /// A role at or above this one.
    MinRole(Role),
    /// Exactly this role.
    Role(Role),
}

/// Middleware state: shared auth plus the rule to enforce.
#[derive(Debug, Clone)]
pub struct Gate {
    auth: Arc<AuthState>,
    rule: Rule,
}

impl Gate {
    /// Create a gate enforcing `rule`.
    #[must_use]
    pub const fn new(auth: Arc<AuthState>, rule: Rule) -> Self {
        Self { auth, rule }
    }

    /// The enforced rule.
    #[must_use]
    pub const fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Evaluate the rule for `principal`.
    ///
    /// # Errors
    ///
    /// Returns the denial produced by the access evaluator.
    pub fn check(&self, principal: &Principal) -> Result<(), AccessDenied> {
        let access = &self.auth.access;
        let principal = Some(principal);

        match &self.rule {
            Rule::Authenticated => match principal {
                Some(p) if p.is_authenticated => Ok(()),
                _ => Err(AccessDenied::Unauthenticated),
            },
            Rule::Permission(permission) => access.require_permission(principal, *permission),
            Rule::AnyPermission(permissions) => {
                access.require_any_permission(principal, permissions)
            }
            Rule::AllPermissions(permissions) => {
                access.require_all_permissions(principal, permissions)
            }
            Rule::MinRole(role) => access.require_min_role(principal, *role),
            Rule::Role(role) => access.require_role(principal, *role),
        }
    }
}

impl FromRef<Gate> for Arc<AuthState> {
    fn from_ref(gate: &Gate) -> Self {
        Arc::clone(&gate.auth)
    }
}

/// Resolve the caller, apply the gate's rule, and hand the identity to the
/// handler through request extensions.
///
/// # Errors
///
/// 401 when no valid identity is presented, 403 when the rule is not met.
pub async fn enforce(
    State(gate): State<Gate>,
    auth: RequireAuth,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    gate.check(&auth.principal).inspect_err(|e| {
        tracing::debug!(
            username = %auth.principal.username,
            path = %request.uri().path(),
            "Gate refused request: {e}"
        );
    })?;

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}
