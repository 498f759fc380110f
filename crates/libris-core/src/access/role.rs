//! Roles and permission tags.

use serde::{Deserialize, Serialize};

use super::AccessError;

/// User role, ordered by privilege.
///
/// The derived ordering follows declaration order, so
/// `Guest < Reader < Librarian < Admin`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Anonymous or unrecognised identity. Read-only catalogue access.
    #[default]
    Guest,
    /// Registered reader: downloads books, writes reviews.
    Reader,
    /// Staff: curates the catalogue and moderates reviews.
    Librarian,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Every role, lowest privilege first.
    pub const ALL: [Self; 4] = [Self::Guest, Self::Reader, Self::Librarian, Self::Admin];

    /// Position in the role hierarchy (guest = 0 .. admin = 3).
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Guest => 0,
            Self::Reader => 1,
            Self::Librarian => 2,
            Self::Admin => 3,
        }
    }

    /// Whether this role is at least as privileged as `min`.
    #[must_use]
    pub const fn at_least(self, min: Self) -> bool {
        self.level() >= min.level()
    }

    /// The role directly below this one, if any.
    #[must_use]
    pub const fn below(self) -> Option<Self> {
        match self {
            Self::Guest => None,
            Self::Reader => Some(Self::Guest),
            Self::Librarian => Some(Self::Reader),
            Self::Admin => Some(Self::Librarian),
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Reader => "reader",
            Self::Librarian => "librarian",
            Self::Admin => "admin",
        }
    }

    /// Coerce an untrusted role string (e.g. a token claim).
    ///
    /// Missing or unrecognised values fall back to [`Role::Guest`], never to a
    /// more privileged role.
    #[must_use]
    pub fn coerce(value: Option<&str>) -> Self {
        match value {
            Some(s) => s.parse().unwrap_or_else(|_| {
                tracing::debug!(role = %s, "Unrecognised role, treating as guest");
                Self::Guest
            }),
            None => Self::Guest,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "reader" => Ok(Self::Reader),
            "librarian" => Ok(Self::Librarian),
            "admin" => Ok(Self::Admin),
            _ => Err(AccessError::UnknownRole(s.to_string())),
        }
    }
}

/// Capability tag checked by the access evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    // Books
    /// Browse the catalogue and read book details.
    ReadBooks,
    /// Download book files.
    DownloadBooks,
    /// Upload new book files.
    UploadBooks,
    /// Edit book metadata.
    EditBooks,
    /// Remove books from the catalogue.
    DeleteBooks,

    // Categories
    /// List categories.
    ReadCategories,
    /// Create or rename categories.
    EditCategories,
    /// Remove categories.
    DeleteCategories,

    // Authors
    /// List authors.
    ReadAuthors,
    /// Create or edit authors.
    EditAuthors,
    /// Remove authors.
    DeleteAuthors,

    // Reviews
    /// Read reviews.
    ReadReviews,
    /// Post reviews.
    WriteReviews,
    /// Edit own reviews.
    EditReviews,
    /// Delete own reviews.
    DeleteReviews,
    /// Edit or delete any review.
    ModerateReviews,

    // Users
    /// List user accounts.
    ReadUsers,
    /// Edit or (de)activate user accounts.
    EditUsers,
    /// Delete user accounts.
    DeleteUsers,
    /// Change user roles.
    ManageRoles,

    // System
    /// Open the administration panel.
    ViewAdminPanel,
    /// Change system settings.
    ManageSystem,
    /// View usage statistics.
    ViewStatistics,
}

impl Permission {
    /// Every defined permission.
    pub const ALL: [Self; 23] = [
        Self::ReadBooks,
        Self::DownloadBooks,
        Self::UploadBooks,
        Self::EditBooks,
        Self::DeleteBooks,
        Self::ReadCategories,
        Self::EditCategories,
        Self::DeleteCategories,
        Self::ReadAuthors,
        Self::EditAuthors,
        Self::DeleteAuthors,
        Self::ReadReviews,
        Self::WriteReviews,
        Self::EditReviews,
        Self::DeleteReviews,
        Self::ModerateReviews,
        Self::ReadUsers,
        Self::EditUsers,
        Self::DeleteUsers,
        Self::ManageRoles,
        Self::ViewAdminPanel,
        Self::ManageSystem,
        Self::ViewStatistics,
    ];

    /// Snake-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadBooks => "read_books",
            Self::DownloadBooks => "download_books",
            Self::UploadBooks => "upload_books",
            Self::EditBooks => "edit_books",
            Self::DeleteBooks => "delete_books",
            Self::ReadCategories => "read_categories",
            Self::EditCategories => "edit_categories",
            Self::DeleteCategories => "delete_categories",
            Self::ReadAuthors => "read_authors",
            Self::EditAuthors => "edit_authors",
            Self::DeleteAuthors => "delete_authors",
            Self::ReadReviews => "read_reviews",
            Self::WriteReviews => "write_reviews",
            Self::EditReviews => "edit_reviews",
            Self::DeleteReviews => "delete_reviews",
            Self::ModerateReviews => "moderate_reviews",
            Self::ReadUsers => "read_users",
            Self::EditUsers => "edit_users",
            Self::DeleteUsers => "delete_users",
            Self::ManageRoles => "manage_roles",
            Self::ViewAdminPanel => "view_admin_panel",
            Self::ManageSystem => "manage_system",
            Self::ViewStatistics => "view_statistics",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| AccessError::UnknownPermission(s.to_string()))
    }
}
