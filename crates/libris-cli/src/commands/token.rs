//! Token command - mint and inspect access tokens offline.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use libris_core::access::{AccessControl, Principal, Role};
use libris_core::config::Config;
use libris_core::token::{Claims, TokenService};
use serde_json::Value;

use crate::ui;

/// Token actions.
#[derive(Debug, Clone)]
pub enum TokenAction {
    /// Sign a new token.
    Issue {
        /// Subject.
        sub: String,
        /// Role claim.
        role: String,
        /// Numeric user id claim.
        user_id: Option<i64>,
        /// Lifetime override in minutes.
        ttl_minutes: Option<u64>,
        /// Extra `key=value` claims.
        claims: Vec<String>,
    },
    /// Verify a token and print its claims.
    Verify {
        /// Encoded token.
        token: String,
    },
}

/// Run the token command.
///
/// # Errors
///
/// Returns error if no secret is configured, arguments are invalid, or the
/// token fails verification.
pub fn run_token(config: &Config, action: TokenAction) -> Result<()> {
    let service = token_service(config)?;

    match action {
        TokenAction::Issue {
            sub,
            role,
            user_id,
            ttl_minutes,
            claims,
        } => {
            let token = issue(&service, &sub, &role, user_id, ttl_minutes, &claims)?;
            println!("{token}");
        }
        TokenAction::Verify { token } => {
            let claims = service.verify(token.trim()).context("Token rejected")?;
            let access = AccessControl::new(config.permission_matrix()?);

            println!("{}", serde_json::to_string_pretty(&claims)?);

            let principal = Principal::from_claims(&claims).unwrap_or_else(Principal::anonymous);
            ui::header("Effective access");
            ui::kv("Subject", &principal.username);
            if let Some(email) = claims.email() {
                ui::kv("Email", email);
            }
            ui::kv("Role", principal.role.as_str());
            for permission in access.permissions_for(principal.role) {
                ui::item(permission.as_str());
            }
        }
    }

    Ok(())
}

fn token_service(config: &Config) -> Result<TokenService> {
    if config.auth.secret_key.is_none() {
        bail!("auth.secretKey is not set; offline tokens need a fixed secret (or LIBRIS_SECRET_KEY)");
    }
    Ok(TokenService::new(&config.auth.signing_key(), config.auth.token_ttl()))
}

fn issue(
    service: &TokenService,
    sub: &str,
    role: &str,
    user_id: Option<i64>,
    ttl_minutes: Option<u64>,
    claims: &[String],
) -> Result<String> {
    let role: Role = role.parse()?;
    let ttl = match ttl_minutes {
        Some(0) => bail!("--ttl-minutes must be greater than zero"),
        Some(minutes) => Duration::from_secs(minutes.saturating_mul(60)),
        None => service.ttl(),
    };

    let mut token_claims = Claims::for_user(sub, role.as_str(), user_id);
    for raw in claims {
        let (key, value) = parse_claim(raw)?;
        token_claims.insert(key, value);
    }

    let token = service.issue(token_claims, ttl)?;
    tracing::debug!(%sub, %role, ttl_secs = ttl.as_secs(), "Issued token");
    Ok(token)
}

/// Split `key=value`. Values that parse as JSON keep their type, anything
/// else is a string.
fn parse_claim(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid claim '{raw}', expected key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid claim '{raw}', key is empty");
    }
    if matches!(key, "exp" | "iat") {
        bail!("'{key}' is set from --ttl-minutes");
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_claim_types() {
        assert_eq!(parse_claim("dept=archives").unwrap(), ("dept".to_string(), json!("archives")));
        assert_eq!(parse_claim("quota=5").unwrap(), ("quota".to_string(), json!(5)));
        assert_eq!(parse_claim("beta=true").unwrap(), ("beta".to_string(), json!(true)));
        assert_eq!(parse_claim("note=a=b").unwrap(), ("note".to_string(), json!("a=b")));
    }

    #[test]
    fn test_parse_claim_rejects_bad_input() {
        assert!(parse_claim("no-separator").is_err());
        assert!(parse_claim("=value").is_err());
        assert!(parse_claim("exp=0").is_err());
    }

    fn configured() -> Config {
        let mut config = Config::default();
        config.auth.secret_key = Some("cli-test-secret-value".to_string());
        config
    }

    #[test]
    fn test_issue_then_verify() {
        let service = token_service(&configured()).unwrap();
        let token = issue(
            &service,
            "alice",
            "Librarian",
            Some(7),
            Some(5),
            &["email=alice@example.org".to_string(), "quota=3".to_string()],
        )
        .unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.subject(), Some("alice"));
        assert_eq!(claims.role(), Some("librarian"));
        assert_eq!(claims.user_id(), Some(7));
        assert_eq!(claims.email(), Some("alice@example.org"));
        assert_eq!(claims.get("quota"), Some(&json!(3)));

        let lifetime = claims.expires_at().unwrap() - claims.issued_at().unwrap();
        assert_eq!(lifetime, 300);

        assert!(run_token(&configured(), TokenAction::Verify { token }).is_ok());
    }

    #[test]
    fn test_issue_rejects_bad_arguments() {
        let service = token_service(&configured()).unwrap();
        assert!(issue(&service, "alice", "wizard", None, None, &[]).is_err());
        assert!(issue(&service, "alice", "reader", None, Some(0), &[]).is_err());
        assert!(issue(&service, "alice", "reader", None, None, &["iat=1".to_string()]).is_err());
    }

    #[test]
    fn test_verify_rejects_foreign_token() {
        let mut other = Config::default();
        other.auth.secret_key = Some("a-different-secret-value".to_string());
        let token = issue(&token_service(&other).unwrap(), "bob", "admin", None, None, &[]).unwrap();

        assert!(run_token(&configured(), TokenAction::Verify { token }).is_err());
    }

    #[test]
    fn test_requires_secret() {
        let action = TokenAction::Verify {
            token: "a.b.c".to_string(),
        };
        assert!(run_token(&Config::default(), action).is_err());
    }
}
