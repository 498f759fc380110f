//! Admin user management commands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use libris_core::access::Role;
use libris_core::config::Config;
use libris_gateway::auth::setup::generate_password;
use libris_gateway::{User, UserStore};

use crate::ui;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Admin actions.
pub enum AdminAction {
    /// Create a new user.
    Create {
        /// Login name.
        username: String,
        /// Email, defaulting to `<username>@localhost`.
        email: Option<String>,
        /// Explicit password.
        password: Option<String>,
        /// Role name.
        role: String,
        /// Generate a random password instead.
        generate_password: bool,
    },
    /// List all users.
    List,
    /// Change a user's role.
    SetRole {
        /// Login name.
        username: String,
        /// New role name.
        role: String,
    },
    /// Reset a user's password.
    ResetPassword {
        /// Login name.
        username: String,
    },
    /// Enable a user account.
    Enable {
        /// Login name.
        username: String,
    },
    /// Disable a user account.
    Disable {
        /// Login name.
        username: String,
    },
    /// Delete a user.
    Delete {
        /// Login name.
        username: String,
    },
}

/// Run the admin command.
///
/// The gateway holds the database lock while running, so stop it first.
///
/// # Errors
///
/// Returns error if the store cannot be opened or the operation fails.
pub fn run_admin(config: &Config, args: AdminArgs) -> Result<()> {
    let data_dir = args.data_dir.unwrap_or_else(|| config.data_dir());
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let store = UserStore::open(&data_dir)
        .context("Failed to open user store (is the gateway running?)")?;

    match args.action {
        AdminAction::Create {
            username,
            email,
            password,
            role,
            generate_password: gen_pwd,
        } => create_user(&store, &username, email, password.as_deref(), &role, gen_pwd),
        AdminAction::List => list_users(&store),
        AdminAction::SetRole { username, role } => set_role(&store, &username, &role),
        AdminAction::ResetPassword { username } => reset_password(&store, &username),
        AdminAction::Enable { username } => set_user_active(&store, &username, true),
        AdminAction::Disable { username } => set_user_active(&store, &username, false),
        AdminAction::Delete { username } => delete_user(&store, &username),
    }
}

fn create_user(
    store: &UserStore,
    username: &str,
    email: Option<String>,
    password: Option<&str>,
    role: &str,
    gen_pwd: bool,
) -> Result<()> {
    let role: Role = role
        .parse()
        .with_context(|| format!("Invalid role: {role}. Use: guest, reader, librarian, or admin"))?;

    let password = if gen_pwd {
        let pwd = generate_password(16);
        ui::success(&format!("Generated password: {pwd}"));
        pwd
    } else {
        password
            .map(String::from)
            .context("Password required. Use --password or --generate-password")?
    };

    let email = email.unwrap_or_else(|| format!("{username}@localhost"));
    let user = User::new(username, email, &password, role).context("Failed to create user")?;
    let user = store.create(user).context("Failed to save user")?;

    ui::success(&format!(
        "Created user '{}' (id {}) with role '{}'",
        user.username, user.id, user.role
    ));

    Ok(())
}

fn list_users(store: &UserStore) -> Result<()> {
    let users = store.list().context("Failed to list users")?;

    if users.is_empty() {
        ui::info("No users configured.");
        ui::info(
            "Run 'libris admin create --username admin --generate-password' to create an admin user.",
        );
        return Ok(());
    }

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    ui::table_row(&[
        ("ID", 6),
        ("USERNAME", 20),
        ("ROLE", 11),
        ("ACTIVE", 8),
        ("LAST LOGIN", 20),
    ]);
    ui::rule(65);

    for user in users {
        let id = user.id.to_string();
        let active = if user.is_active { "yes" } else { "no" };
        let last_login = user.last_login.map_or_else(
            || "never".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        ui::table_row(&[
            (id.as_str(), 6),
            (user.username.as_str(), 20),
            (user.role.as_str(), 11),
            (active, 8),
            (last_login.as_str(), 20),
        ]);
    }

    Ok(())
}

fn set_role(store: &UserStore, username: &str, role: &str) -> Result<()> {
    let role: Role = role.parse()?;
    let user = find(store, username)?;

    if role != Role::Admin {
        ensure_not_last_admin(store, &user, "demote")?;
    }

    store.set_role(user.id, role).context("Failed to update user")?;
    ui::success(&format!("User '{username}' is now '{role}'"));
    Ok(())
}

fn reset_password(store: &UserStore, username: &str) -> Result<()> {
    let mut user = find(store, username)?;
    let new_password = generate_password(16);

    user.set_password(&new_password)
        .context("Failed to set password")?;
    store.update(&user).context("Failed to update user")?;

    ui::success(&format!("Password reset for user '{username}'"));
    ui::success(&format!("New password: {new_password}"));

    Ok(())
}

fn set_user_active(store: &UserStore, username: &str, active: bool) -> Result<()> {
    let user = find(store, username)?;
    if !active {
        ensure_not_last_admin(store, &user, "disable")?;
    }

    store
        .set_active(user.id, active)
        .context("Failed to update user")?;

    let status = if active { "enabled" } else { "disabled" };
    ui::success(&format!("User '{username}' {status}"));

    Ok(())
}

fn delete_user(store: &UserStore, username: &str) -> Result<()> {
    let user = find(store, username)?;
    ensure_not_last_admin(store, &user, "delete")?;

    store.delete(user.id).context("Failed to delete user")?;
    ui::success(&format!("Deleted user '{username}'"));

    Ok(())
}

fn find(store: &UserStore, username: &str) -> Result<User> {
    store
        .get_by_username(username)
        .context("Failed to find user")?
        .with_context(|| format!("User not found: {username}"))
}

/// Refuse to remove the only active admin.
fn ensure_not_last_admin(store: &UserStore, user: &User, verb: &str) -> Result<()> {
    if user.role != Role::Admin || !user.is_active {
        return Ok(());
    }

    let users = store.list().context("Failed to list users")?;
    let admin_count = users
        .iter()
        .filter(|u| u.role == Role::Admin && u.is_active)
        .count();

    if admin_count <= 1 {
        bail!("Cannot {verb} the last admin user");
    }
    Ok(())
}
