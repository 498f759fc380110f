//! Role to permission table.

use std::collections::{BTreeMap, BTreeSet};

use super::AccessError;
use super::role::{Permission, Role};

/// Immutable mapping from each role to the permissions it grants.
///
/// Every role's set contains the set of the role directly below it; the
/// constructors refuse tables that break this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    grants: [BTreeSet<Permission>; 4],
}

impl PermissionMatrix {
    /// The built-in library table.
    #[must_use]
    pub fn standard() -> Self {
        use Permission::{
            DeleteAuthors, DeleteBooks, DeleteCategories, DeleteReviews, DeleteUsers,
            DownloadBooks, EditAuthors, EditBooks, EditCategories, EditReviews, EditUsers,
            ManageRoles, ManageSystem, ModerateReviews, ReadAuthors, ReadBooks, ReadCategories,
            ReadReviews, ReadUsers, UploadBooks, ViewAdminPanel, ViewStatistics, WriteReviews,
        };

        let guest: BTreeSet<_> = [ReadBooks, ReadCategories, ReadAuthors, ReadReviews].into();

        let mut reader = guest.clone();
        reader.extend([DownloadBooks, WriteReviews, EditReviews, DeleteReviews]);

        let mut librarian = reader.clone();
        librarian.extend([
            UploadBooks,
            EditBooks,
            EditCategories,
            EditAuthors,
            ModerateReviews,
            ReadUsers,
        ]);

        let mut admin = librarian.clone();
        admin.extend([
            DeleteBooks,
            DeleteCategories,
            DeleteAuthors,
            EditUsers,
            DeleteUsers,
            ManageRoles,
            ViewAdminPanel,
            ManageSystem,
            ViewStatistics,
        ]);

        Self {
            grants: [guest, reader, librarian, admin],
        }
    }

    /// Build a table from explicit grants.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::MissingRole`] if a role has no entry, or
    /// [`AccessError::NotMonotonic`] if a role lacks a permission held by the
    /// role below it.
    pub fn from_grants<I, P>(grants: I) -> Result<Self, AccessError>
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator<Item = Permission>,
    {
        let mut by_role: BTreeMap<Role, BTreeSet<Permission>> = BTreeMap::new();
        for (role, perms) in grants {
            by_role.entry(role).or_default().extend(perms);
        }

        let mut table: [BTreeSet<Permission>; 4] = Default::default();
        for role in Role::ALL {
            table[usize::from(role.level())] = by_role
                .remove(&role)
                .ok_or(AccessError::MissingRole(role))?;
        }

        let matrix = Self { grants: table };
        matrix.check_monotonic()?;
        Ok(matrix)
    }

    fn check_monotonic(&self) -> Result<(), AccessError> {
        for role in Role::ALL {
            let Some(lower) = role.below() else { continue };
            let missing = self
                .get(lower)
                .difference(self.get(role))
                .next()
                .copied();
            if let Some(permission) = missing {
                return Err(AccessError::NotMonotonic {
                    role,
                    lower,
                    permission,
                });
            }
        }
        Ok(())
    }

    /// Permissions granted to `role`.
    #[must_use]
    pub fn get(&self, role: Role) -> &BTreeSet<Permission> {
        &self.grants[usize::from(role.level())]
    }

    /// Union of every permission granted to any role.
    #[must_use]
    pub fn all_granted(&self) -> BTreeSet<Permission> {
        self.grants.iter().flatten().copied().collect()
    }

    /// Iterate `(role, permissions)` from lowest to highest role.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &BTreeSet<Permission>)> {
        Role::ALL.into_iter().map(move |role| (role, self.get(role)))
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_is_monotonic() {
        let matrix = PermissionMatrix::standard();
        assert!(matrix.check_monotonic().is_ok());

        for role in Role::ALL {
            if let Some(lower) = role.below() {
                assert!(
                    matrix.get(role).len() > matrix.get(lower).len(),
                    "{role} should grant strictly more than {lower}"
                );
            }
        }
    }

    #[test]
    fn test_admin_holds_everything() {
        let matrix = PermissionMatrix::standard();
        let all: BTreeSet<_> = Permission::ALL.into_iter().collect();
        assert_eq!(matrix.get(Role::Admin), &all);
        assert_eq!(matrix.all_granted(), all);
    }

    #[test]
    fn test_standard_table_contents() {
        let matrix = PermissionMatrix::standard();

        let guest: BTreeSet<_> = [
            Permission::ReadBooks,
            Permission::ReadCategories,
            Permission::ReadAuthors,
            Permission::ReadReviews,
        ]
        .into();
        assert_eq!(matrix.get(Role::Guest), &guest);

        assert!(matrix.get(Role::Reader).contains(&Permission::DownloadBooks));
        assert!(!matrix.get(Role::Reader).contains(&Permission::UploadBooks));
        assert!(matrix.get(Role::Librarian).contains(&Permission::ModerateReviews));
        assert!(!matrix.get(Role::Librarian).contains(&Permission::DeleteBooks));
        assert_eq!(matrix.get(Role::Reader).len(), 8);
        assert_eq!(matrix.get(Role::Librarian).len(), 14);
    }

    #[test]
    fn test_from_grants_matches_standard() {
        let standard = PermissionMatrix::standard();
        let rebuilt = PermissionMatrix::from_grants(
            standard
                .iter()
                .map(|(role, perms)| (role, perms.iter().copied().collect::<Vec<_>>())),
        )
        .unwrap();
        assert_eq!(rebuilt, standard);
    }

    #[test]
    fn test_from_grants_rejects_missing_role() {
        let result = PermissionMatrix::from_grants([
            (Role::Guest, vec![Permission::ReadBooks]),
            (Role::Reader, vec![Permission::ReadBooks]),
            (Role::Admin, vec![Permission::ReadBooks]),
        ]);
        assert!(matches!(
            result,
            Err(AccessError::MissingRole(Role::Librarian))
        ));
    }

    #[test]
    fn test_from_grants_rejects_shrinking_role() {
        let result = PermissionMatrix::from_grants([
            (Role::Guest, vec![Permission::ReadBooks]),
            (
                Role::Reader,
                vec![Permission::ReadBooks, Permission::DownloadBooks],
            ),
            (Role::Librarian, vec![Permission::ReadBooks]),
            (Role::Admin, Permission::ALL.to_vec()),
        ]);
        assert!(matches!(
            result,
            Err(AccessError::NotMonotonic {
                role: Role::Librarian,
                lower: Role::Reader,
                permission: Permission::DownloadBooks,
            })
        ));
    }
}
