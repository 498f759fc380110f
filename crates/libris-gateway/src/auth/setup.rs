//! First-run admin setup.

use libris_core::access::Role;
use rand::Rng;

use super::AuthError;
use super::users::{User, UserStore};

/// Auto-setup from environment variables.
///
/// Checks for `LIBRIS_ADMIN_USERNAME` and `LIBRIS_ADMIN_PASSWORD` (plus the
/// optional `LIBRIS_ADMIN_EMAIL`) and creates an admin user if both are set
/// and no users exist.
///
/// # Errors
///
/// Returns error if user creation fails.
pub fn auto_setup_from_env(user_store: &UserStore) -> Result<Option<User>, AuthError> {
    auto_setup_with(user_store, |key| std::env::var(key).ok())
}

/// [`auto_setup_from_env`] with an arbitrary variable lookup.
///
/// # Errors
///
/// Returns error if user creation fails.
pub fn auto_setup_with(
    user_store: &UserStore,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<User>, AuthError> {
    // Only auto-setup if no users exist
    if !user_store.is_empty() {
        return Ok(None);
    }

    let Some(username) = lookup("LIBRIS_ADMIN_USERNAME").filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let Some(password) = lookup("LIBRIS_ADMIN_PASSWORD").filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let email = lookup("LIBRIS_ADMIN_EMAIL")
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| format!("{username}@localhost"));

    let admin = user_store.create(User::new(&username, email, &password, Role::Admin)?)?;

    tracing::info!(
        username = %admin.username,
        "Admin user created from environment variables"
    );

    Ok(Some(admin))
}

/// Generate a secure random password.
#[must_use]
pub fn generate_password(length: usize) -> String {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_auto_setup_creates_admin() {
        let store = UserStore::open_temporary().unwrap();
        let created = auto_setup_with(
            &store,
            env(&[
                ("LIBRIS_ADMIN_USERNAME", "root"),
                ("LIBRIS_ADMIN_PASSWORD", "bootstrap-pass"),
            ]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.email, "root@localhost");
        assert!(created.verify_password("bootstrap-pass").is_ok());
    }

    #[test]
    fn test_auto_setup_skips_when_incomplete_or_initialized() {
        let store = UserStore::open_temporary().unwrap();
        let none = auto_setup_with(&store, env(&[("LIBRIS_ADMIN_USERNAME", "root")])).unwrap();
        assert!(none.is_none());
        assert!(store.is_empty());

        let vars = [
            ("LIBRIS_ADMIN_USERNAME", "root"),
            ("LIBRIS_ADMIN_PASSWORD", "bootstrap-pass"),
            ("LIBRIS_ADMIN_EMAIL", "root@library.example"),
        ];
        assert!(auto_setup_with(&store, env(&vars)).unwrap().is_some());
        assert!(auto_setup_with(&store, env(&vars)).unwrap().is_none());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_generate_password() {
        let pwd1 = generate_password(16);
        let pwd2 = generate_password(16);

        assert_eq!(pwd1.len(), 16);
        assert_ne!(pwd1, pwd2);
    }
}
