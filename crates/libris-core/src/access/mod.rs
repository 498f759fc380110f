//! Role-based access control.
//!
//! - [`Role`] and [`Permission`]: the fixed vocabulary
//! - [`PermissionMatrix`]: immutable role → permission table
//! - [`AccessControl`]: stateless evaluator answering authorization questions
//! - [`Principal`]: the identity a question is asked about
//!
//! The evaluator only answers yes/no. The `require_*` helpers turn a "no" into
//! an [`AccessDenied`] that keeps "who are you?" apart from "you may not".

mod matrix;
mod principal;
mod role;

pub use matrix::PermissionMatrix;
pub use principal::{ANONYMOUS, Principal};
pub use role::{Permission, Role};

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

/// Errors building roles, permissions or permission tables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Role string not recognised.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Permission string not recognised.
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// Permission table has no entry for a role.
    #[error("Permission table has no entry for role '{0}'")]
    MissingRole(Role),

    /// A role lacks something the role below it holds.
    #[error("Role '{role}' lacks '{permission}' granted to lower role '{lower}'")]
    NotMonotonic {
        /// The higher role.
        role: Role,
        /// The role directly below it.
        lower: Role,
        /// Permission held by `lower` but not by `role`.
        permission: Permission,
    },
}

/// Why an authorization check said no.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessDenied {
    /// No valid identity was presented.
    #[error("Authentication required")]
    Unauthenticated,

    /// Identity is valid but lacks the privilege.
    #[error("Forbidden: {required}")]
    Forbidden {
        /// Human-readable description of what was required.
        required: String,
    },
}

impl AccessDenied {
    fn forbidden(required: impl Into<String>) -> Self {
        Self::Forbidden {
            required: required.into(),
        }
    }
}

/// Stateless authorization evaluator over a shared [`PermissionMatrix`].
///
/// Cloning is cheap; every clone reads the same table.
#[derive(Debug, Clone)]
pub struct AccessControl {
    matrix: Arc<PermissionMatrix>,
}

impl AccessControl {
    /// Create an evaluator over `matrix`.
    #[must_use]
    pub fn new(matrix: PermissionMatrix) -> Self {
        Self {
            matrix: Arc::new(matrix),
        }
    }

    /// Evaluator over the built-in table.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(PermissionMatrix::standard())
    }

    /// The table this evaluator reads.
    #[must_use]
    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    /// Permissions granted to `role`.
    #[must_use]
    pub fn permissions_for(&self, role: Role) -> &BTreeSet<Permission> {
        self.matrix.get(role)
    }

    /// Permissions for an untrusted role string; unknown or missing roles get
    /// guest permissions.
    #[must_use]
    pub fn permissions_for_claim(&self, role: Option<&str>) -> &BTreeSet<Permission> {
        self.permissions_for(Role::coerce(role))
    }

    /// Whether `role` holds `permission`.
    #[must_use]
    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.permissions_for(role).contains(&permission)
    }

    /// Whether `role` holds at least one of `permissions`. False when empty.
    #[must_use]
    pub fn has_any_permission(&self, role: Role, permissions: &[Permission]) -> bool {
        let granted = self.permissions_for(role);
        permissions.iter().any(|p| granted.contains(p))
    }

    /// Whether `role` holds every one of `permissions`. True when empty.
    #[must_use]
    pub fn has_all_permissions(&self, role: Role, permissions: &[Permission]) -> bool {
        let granted = self.permissions_for(role);
        permissions.iter().all(|p| granted.contains(p))
    }

    /// Whether `role` sits at or above `min_role` in the hierarchy.
    #[must_use]
    pub const fn meets_minimum_role(&self, role: Role, min_role: Role) -> bool {
        role.at_least(min_role)
    }

    /// Whether `role` is exactly `required`.
    #[must_use]
    pub fn has_exact_role(&self, role: Role, required: Role) -> bool {
        role == required
    }

    /// Whether `principal` may edit a resource owned by `owner_id`.
    ///
    /// Owners may always edit; otherwise the role must carry
    /// [`Permission::ModerateReviews`].
    #[must_use]
    pub fn can_edit_resource(&self, principal: &Principal, owner_id: i64) -> bool {
        self.can_edit_resource_with(principal, owner_id, Permission::ModerateReviews)
    }

    /// Same predicate as [`Self::can_edit_resource`]; delete has no separate level.
    #[must_use]
    pub fn can_delete_resource(&self, principal: &Principal, owner_id: i64) -> bool {
        self.can_edit_resource(principal, owner_id)
    }

    /// Ownership check with a caller-chosen override permission.
    #[must_use]
    pub fn can_edit_resource_with(
        &self,
        principal: &Principal,
        owner_id: i64,
        override_permission: Permission,
    ) -> bool {
        principal.owns(owner_id) || self.has_permission(principal.role, override_permission)
    }

    /// Every permission granted to some role.
    #[must_use]
    pub fn all_permissions(&self) -> BTreeSet<Permission> {
        self.matrix.all_granted()
    }

    /// The role hierarchy as `(role, level)` pairs.
    #[must_use]
    pub fn role_hierarchy(&self) -> [(Role, u8); 4] {
        Role::ALL.map(|r| (r, r.level()))
    }

    /// Require `permission`.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::Unauthenticated`] without an authenticated principal,
    /// [`AccessDenied::Forbidden`] if the role lacks the permission.
    pub fn require_permission(
        &self,
        principal: Option<&Principal>,
        permission: Permission,
    ) -> Result<(), AccessDenied> {
        let principal = authenticated(principal)?;
        if self.has_permission(principal.role, permission) {
            Ok(())
        } else {
            Err(denied(
                principal,
                format!("permission required: {permission}"),
            ))
        }
    }

    /// Require at least one of `permissions`.
    ///
    /// # Errors
    ///
    /// See [`Self::require_permission`].
    pub fn require_any_permission(
        &self,
        principal: Option<&Principal>,
        permissions: &[Permission],
    ) -> Result<(), AccessDenied> {
        let principal = authenticated(principal)?;
        if self.has_any_permission(principal.role, permissions) {
            Ok(())
        } else {
            Err(denied(
                principal,
                format!("one of these permissions required: {}", join(permissions)),
            ))
        }
    }

    /// Require every one of `permissions`.
    ///
    /// # Errors
    ///
    /// See [`Self::require_permission`].
    pub fn require_all_permissions(
        &self,
        principal: Option<&Principal>,
        permissions: &[Permission],
    ) -> Result<(), AccessDenied> {
        let principal = authenticated(principal)?;
        if self.has_all_permissions(principal.role, permissions) {
            Ok(())
        } else {
            Err(denied(
                principal,
                format!("all these permissions required: {}", join(permissions)),
            ))
        }
    }

    /// Require a role at or above `min_role`.
    ///
    /// # Errors
    ///
    /// See [`Self::require_permission`].
    pub fn require_min_role(
        &self,
        principal: Option<&Principal>,
        min_role: Role,
    ) -> Result<(), AccessDenied> {
        let principal = authenticated(principal)?;
        if self.meets_minimum_role(principal.role, min_role) {
            Ok(())
        } else {
            Err(denied(principal, format!("minimum role required: {min_role}")))
        }
    }

    /// Require exactly `role`.
    ///
    /// # Errors
    ///
    /// See [`Self::require_permission`].
    pub fn require_role(&self, principal: Option<&Principal>, role: Role) -> Result<(), AccessDenied> {
        let principal = authenticated(principal)?;
        if self.has_exact_role(principal.role, role) {
            Ok(())
        } else {
            Err(denied(principal, format!("role required: {role}")))
        }
    }

    /// Require ownership of `owner_id` or the `override_permission`.
    ///
    /// # Errors
    ///
    /// See [`Self::require_permission`].
    pub fn require_owner_or(
        &self,
        principal: Option<&Principal>,
        owner_id: i64,
        override_permission: Permission,
    ) -> Result<(), AccessDenied> {
        let principal = authenticated(principal)?;
        if self.can_edit_resource_with(principal, owner_id, override_permission) {
            Ok(())
        } else {
            Err(denied(
                principal,
                format!("resource owner or permission required: {override_permission}"),
            ))
        }
    }

    /// Require ownership of `owner_id` or review moderation rights.
    ///
    /// # Errors
    ///
    /// See [`Self::require_permission`].
    pub fn require_owner_or_moderator(
        &self,
        principal: Option<&Principal>,
        owner_id: i64,
    ) -> Result<(), AccessDenied> {
        self.require_owner_or(principal, owner_id, Permission::ModerateReviews)
    }
}

impl Default for AccessControl {
    fn default() -> Self {
        Self::standard()
    }
}

fn authenticated(principal: Option<&Principal>) -> Result<&Principal, AccessDenied> {
    match principal {
        Some(p) if p.is_authenticated => Ok(p),
        _ => Err(AccessDenied::Unauthenticated),
    }
}

fn denied(principal: &Principal, required: String) -> AccessDenied {
    tracing::debug!(
        username = %principal.username,
        role = %principal.role,
        %required,
        "Access denied"
    );
    AccessDenied::forbidden(required)
}

fn join(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(id: i64) -> Principal {
        Principal::authenticated("reader", Role::Reader, Some(id))
    }

    #[test]
    fn test_meets_minimum_role_ordering() {
        let acl = AccessControl::standard();
        for low in Role::ALL {
            for high in Role::ALL {
                if low < high {
                    assert!(acl.meets_minimum_role(high, low));
                    assert!(!acl.meets_minimum_role(low, high));
                }
            }
            assert!(acl.meets_minimum_role(low, low));
        }
    }

    #[test]
    fn test_admin_has_every_permission() {
        let acl = AccessControl::standard();
        for perm in Permission::ALL {
            assert!(acl.has_all_permissions(Role::Admin, &[perm]), "admin lacks {perm}");
        }
        assert!(acl.has_all_permissions(Role::Admin, &Permission::ALL));
    }

    #[test]
    fn test_guest_cannot_download() {
        let acl = AccessControl::standard();
        assert!(!acl.has_permission(Role::Guest, Permission::DownloadBooks));
        assert!(acl.has_permission(Role::Guest, Permission::ReadBooks));
        assert!(acl.has_permission(Role::Reader, Permission::DownloadBooks));
    }

    #[test]
    fn test_any_and_all() {
        let acl = AccessControl::standard();
        let mixed = [Permission::ReadBooks, Permission::DeleteBooks];

        assert!(acl.has_any_permission(Role::Reader, &mixed));
        assert!(!acl.has_all_permissions(Role::Reader, &mixed));
        assert!(acl.has_all_permissions(Role::Admin, &mixed));

        assert!(!acl.has_any_permission(Role::Admin, &[]));
        assert!(acl.has_all_permissions(Role::Guest, &[]));
    }

    #[test]
    fn test_unknown_claim_role_gets_guest_permissions() {
        let acl = AccessControl::standard();
        let guest = acl.permissions_for(Role::Guest);
        assert_eq!(acl.permissions_for_claim(Some("wizard")), guest);
        assert_eq!(acl.permissions_for_claim(None), guest);
        assert_eq!(
            acl.permissions_for_claim(Some("admin")),
            acl.permissions_for(Role::Admin)
        );
    }

    #[test]
    fn test_can_edit_resource() {
        let acl = AccessControl::standard();

        assert!(acl.can_edit_resource(&reader(5), 5));
        assert!(!acl.can_edit_resource(&reader(5), 9));

        let librarian = Principal::authenticated("lib", Role::Librarian, Some(5));
        assert!(acl.can_edit_resource(&librarian, 9));
        assert!(acl.can_delete_resource(&librarian, 9));

        assert!(!acl.can_edit_resource(&Principal::anonymous(), 0));
    }

    #[test]
    fn test_require_distinguishes_unauthenticated_from_forbidden() {
        let acl = AccessControl::standard();

        assert_eq!(
            acl.require_permission(None, Permission::ReadBooks),
            Err(AccessDenied::Unauthenticated)
        );
        assert_eq!(
            acl.require_permission(Some(&Principal::anonymous()), Permission::ReadBooks),
            Err(AccessDenied::Unauthenticated)
        );
        assert!(matches!(
            acl.require_permission(Some(&reader(1)), Permission::ManageRoles),
            Err(AccessDenied::Forbidden { .. })
        ));
        assert!(acl
            .require_permission(Some(&reader(1)), Permission::WriteReviews)
            .is_ok());
    }

    #[test]
    fn test_require_role_variants() {
        let acl = AccessControl::standard();
        let librarian = Principal::authenticated("lib", Role::Librarian, Some(2));

        assert!(acl.require_min_role(Some(&librarian), Role::Reader).is_ok());
        assert!(acl.require_min_role(Some(&librarian), Role::Admin).is_err());
        assert!(acl.require_role(Some(&librarian), Role::Librarian).is_ok());
        assert!(acl.require_role(Some(&librarian), Role::Reader).is_err());

        assert!(acl
            .require_any_permission(
                Some(&librarian),
                &[Permission::ManageSystem, Permission::EditBooks]
            )
            .is_ok());
        let err = acl
            .require_all_permissions(
                Some(&librarian),
                &[Permission::ManageSystem, Permission::EditBooks],
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Forbidden: all these permissions required: manage_system, edit_books"
        );
    }

    #[test]
    fn test_require_owner_or() {
        let acl = AccessControl::standard();
        assert!(acl.require_owner_or_moderator(Some(&reader(5)), 5).is_ok());
        assert!(acl.require_owner_or_moderator(Some(&reader(5)), 6).is_err());
        assert!(acl
            .require_owner_or(Some(&reader(5)), 6, Permission::EditUsers)
            .is_err());

        let admin = Principal::authenticated("root", Role::Admin, Some(1));
        assert!(acl
            .require_owner_or(Some(&admin), 6, Permission::EditUsers)
            .is_ok());
    }

    #[test]
    fn test_role_hierarchy() {
        let acl = AccessControl::standard();
        assert_eq!(
            acl.role_hierarchy(),
            [
                (Role::Guest, 0),
                (Role::Reader, 1),
                (Role::Librarian, 2),
                (Role::Admin, 3)
            ]
        );
        assert_eq!(acl.all_permissions().len(), Permission::ALL.len());
    }
}
