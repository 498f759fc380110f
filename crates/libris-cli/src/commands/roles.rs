//! Roles command - print the effective permission table.

use anyhow::Result;
use libris_core::access::{Permission, Role};
use libris_core::config::Config;

use crate::ui;

/// Print each role with its permissions, or one role with `filter`.
///
/// # Errors
///
/// Returns error if the role name or the configured table is invalid.
pub fn run_roles(config: &Config, filter: Option<&str>) -> Result<()> {
    let matrix = config.permission_matrix()?;
    let only = filter.map(str::parse::<Role>).transpose()?;

    if config.permissions.is_some() {
        ui::info("Using the permission table from the config file");
    }

    for (role, permissions) in matrix.iter() {
        if only.is_some_and(|r| r != role) {
            continue;
        }
        ui::header(&format!("{role} (level {}, {} permissions)", role.level(), permissions.len()));
        for permission in permissions {
            ui::item(permission.as_str());
        }
    }

    if only.is_none() {
        let granted = matrix.all_granted();
        let ungranted: Vec<&str> = Permission::ALL
            .iter()
            .filter(|p| !granted.contains(p))
            .map(|p| p.as_str())
            .collect();
        if !ungranted.is_empty() {
            println!();
            ui::warning(&format!("Granted to no role: {}", ungranted.join(", ")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_roles_with_default_table() {
        let config = Config::default();
        assert!(run_roles(&config, None).is_ok());
        assert!(run_roles(&config, Some("librarian")).is_ok());
        assert!(run_roles(&config, Some("wizard")).is_err());
    }

    #[test]
    fn test_roles_with_override() {
        let grants = |perms: &[&str]| perms.iter().map(ToString::to_string).collect::<Vec<_>>();
        let mut config = Config::default();
        config.permissions = Some(BTreeMap::from([
            ("guest".to_string(), grants(&["read_books"])),
            ("reader".to_string(), grants(&["read_books"])),
            ("librarian".to_string(), grants(&["read_books", "edit_books"])),
            ("admin".to_string(), grants(&["read_books", "edit_books", "manage_roles"])),
        ]));
        assert!(run_roles(&config, None).is_ok());

        config.permissions = Some(BTreeMap::from([(
            "guest".to_string(),
            grants(&["fly_books"]),
        )]));
        assert!(run_roles(&config, None).is_err());
    }
}
