//! User model and storage.

use std::path::Path;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use libris_core::access::Role;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Numeric account id, assigned by the store.
    pub id: i64,
    /// Username for login.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Argon2 password hash (stored in DB, not exposed in public API).
    pub password_hash: String,
    /// User role.
    pub role: Role,
    /// Whether the account may log in.
    pub is_active: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user last logged in.
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new, not yet stored, user with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: &str,
        role: Role,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            full_name: None,
            password_hash: hash_password(password)?,
            role,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        })
    }

    /// Verify a password against this user's hash.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the password doesn't match.
    pub fn verify_password(&self, password: &str) -> Result<(), AuthError> {
        verify_password(password, &self.password_hash)
    }

    /// Update the user's password.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn set_password(&mut self, password: &str) -> Result<(), AuthError> {
        self.password_hash = hash_password(password)?;
        Ok(())
    }

    /// Create a safe version of user for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

/// Public user representation (for API responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    /// Account id.
    pub id: i64,
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: Option<String>,
    /// User role.
    pub role: Role,
    /// Whether active.
    pub is_active: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// Last login time.
    pub last_login: Option<DateTime<Utc>>,
}

/// User store backed by sled.
///
/// Records live in the `users` tree keyed by big-endian id. The
/// `user_index` tree maps `username:<name>` and `email:<address>` to ids and
/// enforces uniqueness with compare-and-swap.
pub struct UserStore {
    db: sled::Db,
    users: sled::Tree,
    index: sled::Tree,
}

impl UserStore {
    /// Open or create a user store under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(data_dir: &Path) -> Result<Self, AuthError> {
        let db = sled::open(data_dir.join("accounts"))
            .map_err(|e| AuthError::Storage(format!("Failed to open account database: {e}")))?;
        Self::with_db(db)
    }

    /// Open a throwaway in-memory store, removed on drop.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be created.
    pub fn open_temporary() -> Result<Self, AuthError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| AuthError::Storage(format!("Failed to open temporary database: {e}")))?;
        Self::with_db(db)
    }

    /// Create a user store with an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if trees cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, AuthError> {
        let users = db
            .open_tree("users")
            .map_err(|e| AuthError::Storage(format!("Failed to open users tree: {e}")))?;
        let index = db
            .open_tree("user_index")
            .map_err(|e| AuthError::Storage(format!("Failed to open index tree: {e}")))?;

        Ok(Self { db, users, index })
    }

    /// Check if any users exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Count total users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.users.len()
    }

    /// Store a new user and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserExists`] if the username or email is taken.
    pub fn create(&self, mut user: User) -> Result<User, AuthError> {
        let next = self
            .db
            .generate_id()
            .map_err(|e| AuthError::Storage(format!("Id generation error: {e}")))?;
        user.id = i64::try_from(next + 1)
            .map_err(|_| AuthError::Storage("Account id space exhausted".to_string()))?;

        let username_key = username_key(&user.username);
        let email_key = email_key(&user.email);

        self.claim(&username_key, user.id)
            .map_err(|e| replace_exists(e, &user.username))?;
        if let Err(e) = self.claim(&email_key, user.id) {
            self.release(&username_key)?;
            return Err(replace_exists(e, &user.email));
        }

        self.write(&user)?;
        self.flush()?;

        tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: i64) -> Result<Option<User>, AuthError> {
        match self.users.get(id.to_be_bytes()) {
            Ok(Some(value)) => decode(&value).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Get error: {e}"))),
        }
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        self.lookup(&username_key(username))
    }

    /// Get a user by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.lookup(&email_key(email))
    }

    /// Update an existing user, moving index entries if username or email changed.
    ///
    /// # Errors
    ///
    /// Returns error if the user doesn't exist, the new username or email is
    /// taken, or storage fails.
    pub fn update(&self, user: &User) -> Result<(), AuthError> {
        let existing = self
            .get(user.id)?
            .ok_or_else(|| AuthError::UserNotFound(user.id.to_string()))?;

        let old_username = username_key(&existing.username);
        let new_username = username_key(&user.username);
        let username_moved = old_username != new_username;
        let old_email = email_key(&existing.email);
        let new_email = email_key(&user.email);
        let email_moved = old_email != new_email;

        // Claim every new key before releasing any old one.
        if username_moved {
            self.claim(&new_username, user.id)
                .map_err(|e| replace_exists(e, &user.username))?;
        }
        if email_moved {
            if let Err(e) = self.claim(&new_email, user.id) {
                if username_moved {
                    self.release(&new_username)?;
                }
                return Err(replace_exists(e, &user.email));
            }
        }

        if username_moved {
            self.release(&old_username)?;
        }
        if email_moved {
            self.release(&old_email)?;
        }

        self.write(user)?;
        self.flush()
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: i64) -> Result<bool, AuthError> {
        let Some(user) = self.get(id)? else {
            return Ok(false);
        };

        self.release(&username_key(&user.username))?;
        self.release(&email_key(&user.email))?;

        let removed = self
            .users
            .remove(id.to_be_bytes())
            .map_err(|e| AuthError::Storage(format!("Delete error: {e}")))?
            .is_some();

        self.flush()?;

        tracing::info!(user_id = id, username = %user.username, "User deleted");
        Ok(removed)
    }

    /// List all users in id order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<User>, AuthError> {
        let mut users = Vec::new();

        for result in self.users.iter() {
            let (_, value) = result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;
            users.push(decode(&value)?);
        }

        Ok(users)
    }

    /// Update last login time for a user.
    ///
    /// # Errors
    ///
    /// Returns error if user doesn't exist or storage fails.
    pub fn update_last_login(&self, id: i64) -> Result<User, AuthError> {
        self.modify(id, |user| user.last_login = Some(Utc::now()))
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns error if user doesn't exist or storage fails.
    pub fn set_role(&self, id: i64, role: Role) -> Result<User, AuthError> {
        let user = self.modify(id, |user| user.role = role)?;
        tracing::info!(user_id = id, username = %user.username, %role, "User role changed");
        Ok(user)
    }

    /// Activate or deactivate a user.
    ///
    /// # Errors
    ///
    /// Returns error if user doesn't exist or storage fails.
    pub fn set_active(&self, id: i64, active: bool) -> Result<User, AuthError> {
        let user = self.modify(id, |user| user.is_active = active)?;
        tracing::info!(user_id = id, username = %user.username, active, "User status changed");
        Ok(user)
    }

    fn modify(&self, id: i64, change: impl FnOnce(&mut User)) -> Result<User, AuthError> {
        let mut user = self
            .get(id)?
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))?;
        change(&mut user);
        self.write(&user)?;
        self.flush()?;
        Ok(user)
    }

    fn lookup(&self, key: &str) -> Result<Option<User>, AuthError> {
        let id = self
            .index
            .get(key.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Index lookup error: {e}")))?;

        match id {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| AuthError::Storage(format!("Corrupt index entry: {key}")))?;
                self.get(i64::from_be_bytes(bytes))
            }
            None => Ok(None),
        }
    }

    fn claim(&self, key: &str, id: i64) -> Result<(), AuthError> {
        self.index
            .compare_and_swap(
                key.as_bytes(),
                None::<&[u8]>,
                Some(id.to_be_bytes().to_vec()),
            )
            .map_err(|e| AuthError::Storage(format!("Index error: {e}")))?
            .map_err(|_| AuthError::UserExists(key.to_string()))
    }

    fn release(&self, key: &str) -> Result<(), AuthError> {
        self.index
            .remove(key.as_bytes())
            .map_err(|e| AuthError::Storage(format!("Index remove error: {e}")))?;
        Ok(())
    }

    fn write(&self, user: &User) -> Result<(), AuthError> {
        let value = serde_json::to_vec(user)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;
        self.users
            .insert(user.id.to_be_bytes(), value)
            .map_err(|e| AuthError::Storage(format!("Insert error: {e}")))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), AuthError> {
        self.db
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore")
            .field("users", &self.count())
            .finish_non_exhaustive()
    }
}

fn username_key(username: &str) -> String {
    format!("username:{username}")
}

fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

fn replace_exists(error: AuthError, taken: &str) -> AuthError {
    match error {
        AuthError::UserExists(_) => AuthError::UserExists(taken.to_string()),
        other => other,
    }
}

fn decode(value: &[u8]) -> Result<User, AuthError> {
    serde_json::from_slice(value)
        .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Config(format!("Password hashing failed: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::Config(format!("Invalid hash: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reader(name: &str) -> User {
        User::new(name, format!("{name}@example.org"), "password123", Role::Reader).unwrap()
    }

    #[test]
    fn test_user_creation() {
        let user = reader("testuser");
        assert_eq!(user.username, "testuser");
        assert_eq!(user.id, 0);
        assert!(user.is_active);
        assert_eq!(user.role, Role::Reader);
    }

    #[test]
    fn test_password_verification() {
        let mut user = reader("testuser");
        assert!(user.verify_password("password123").is_ok());
        assert!(matches!(
            user.verify_password("wrongpassword"),
            Err(AuthError::InvalidCredentials)
        ));

        user.set_password("another-one").unwrap();
        assert!(user.verify_password("another-one").is_ok());
    }

    #[test]
    fn test_public_user_has_no_hash() {
        let json = serde_json::to_value(reader("alice").to_public()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "reader");
    }

    #[test]
    fn test_user_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = UserStore::open(temp_dir.path()).unwrap();

        assert!(store.is_empty());

        let user = store.create(reader("alice")).unwrap();
        assert!(user.id > 0);
        assert!(!store.is_empty());
        assert_eq!(store.count(), 1);

        let loaded = store.get(user.id).unwrap().unwrap();
        assert_eq!(loaded.username, "alice");

        let by_name = store.get_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        let by_email = store.get_by_email("ALICE@example.org").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[test]
    fn test_ids_are_distinct() {
        let store = UserStore::open_temporary().unwrap();
        let a = store.create(reader("a")).unwrap();
        let b = store.create(reader("b")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(
            store.list().unwrap().iter().map(|u| u.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );
    }

    #[test]
    fn test_duplicate_user() {
        let store = UserStore::open_temporary().unwrap();
        store.create(reader("admin")).unwrap();

        let same_name = User::new("admin", "other@example.org", "pw", Role::Admin).unwrap();
        assert!(matches!(
            store.create(same_name),
            Err(AuthError::UserExists(name)) if name == "admin"
        ));

        let same_email = User::new("other", "Admin@Example.org", "pw", Role::Reader).unwrap();
        assert!(matches!(store.create(same_email), Err(AuthError::UserExists(_))));

        // The failed email claim must not leave the username reserved.
        let retry = User::new("other", "fresh@example.org", "pw", Role::Reader).unwrap();
        assert!(store.create(retry).is_ok());
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_update_moves_email_index() {
        let store = UserStore::open_temporary().unwrap();
        let mut user = store.create(reader("bob")).unwrap();
        store.create(reader("carol")).unwrap();

        user.email = "carol@example.org".to_string();
        assert!(matches!(store.update(&user), Err(AuthError::UserExists(_))));

        user.email = "robert@example.org".to_string();
        user.full_name = Some("Robert".to_string());
        store.update(&user).unwrap();

        assert!(store.get_by_email("bob@example.org").unwrap().is_none());
        let loaded = store.get_by_email("robert@example.org").unwrap().unwrap();
        assert_eq!(loaded.full_name.as_deref(), Some("Robert"));
    }

    #[test]
    fn test_failed_rename_keeps_index_consistent() {
        let store = UserStore::open_temporary().unwrap();
        let mut user = store.create(reader("frank")).unwrap();
        store.create(reader("grace")).unwrap();

        user.username = "francis".to_string();
        user.email = "grace@example.org".to_string();
        assert!(matches!(store.update(&user), Err(AuthError::UserExists(_))));

        let by_old = store.get_by_username("frank").unwrap().unwrap();
        assert_eq!(by_old.id, user.id);
        assert!(store.get_by_username("francis").unwrap().is_none());
        assert!(matches!(
            store.create(reader("frank")),
            Err(AuthError::UserExists(_))
        ));
        assert!(store.create(reader("francis")).is_ok());
    }

    #[test]
    fn test_role_status_and_login() {
        let store = UserStore::open_temporary().unwrap();
        let user = store.create(reader("dave")).unwrap();

        let promoted = store.set_role(user.id, Role::Librarian).unwrap();
        assert_eq!(promoted.role, Role::Librarian);

        let disabled = store.set_active(user.id, false).unwrap();
        assert!(!disabled.is_active);

        let logged_in = store.update_last_login(user.id).unwrap();
        assert!(logged_in.last_login.is_some());

        assert!(matches!(
            store.set_role(999, Role::Admin),
            Err(AuthError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_delete_frees_username() {
        let store = UserStore::open_temporary().unwrap();
        let user = store.create(reader("erin")).unwrap();

        assert!(store.delete(user.id).unwrap());
        assert!(!store.delete(user.id).unwrap());
        assert!(store.get_by_username("erin").unwrap().is_none());
        assert!(store.create(reader("erin")).is_ok());
    }
}
