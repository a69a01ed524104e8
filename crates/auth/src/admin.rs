//! Back-office accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herbstore_core::{AdminId, DomainError, DomainResult};

use crate::password::{hash_password, PasswordError};
use crate::AdminRole;

/// Stored admin account. The hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: AdminId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: AdminRole,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub fn summary(&self) -> AdminSummary {
        AdminSummary {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// What login responses and `me` expose about an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSummary {
    pub id: AdminId,
    pub username: String,
    pub role: AdminRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAdmin {
    pub username: String,
    pub password: String,
    pub role: AdminRole,
}

impl NewAdmin {
    /// Validate and hash. Usernames are stored lowercased.
    pub fn into_admin(self, now: DateTime<Utc>) -> DomainResult<AdminUser> {
        let username = normalize_username(&self.username)?;
        let password_hash = hash_password(&self.password).map_err(|e| match e {
            PasswordError::TooShort => DomainError::validation(e.to_string()),
            PasswordError::Hash(msg) => DomainError::validation(format!("could not hash password: {msg}")),
        })?;
        Ok(AdminUser {
            id: AdminId::new(),
            username,
            password_hash,
            role: self.role,
            is_active: true,
            last_login: None,
            created_at: now,
        })
    }
}

pub fn normalize_username(raw: &str) -> DomainResult<String> {
    let username = raw.trim().to_ascii_lowercase();
    if username.len() < 3 || username.len() > 50 {
        return Err(DomainError::validation("username must be 3 to 50 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(DomainError::validation(
            "username may contain only letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify_password;

    #[test]
    fn new_admin_is_hashed_and_normalized() {
        let admin = NewAdmin {
            username: "  Store.Owner ".to_string(),
            password: "s3cret-pass".to_string(),
            role: AdminRole::LimitedAdmin,
        }
        .into_admin(Utc::now())
        .unwrap();

        assert_eq!(admin.username, "store.owner");
        assert!(admin.is_active);
        assert!(verify_password("s3cret-pass", &admin.password_hash));
    }

    #[test]
    fn hash_is_not_serialized() {
        let admin = NewAdmin {
            username: "owner".to_string(),
            password: "long-enough".to_string(),
            role: AdminRole::Admin,
        }
        .into_admin(Utc::now())
        .unwrap();
        let json = serde_json::to_value(&admin).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn bad_usernames_and_short_passwords_are_rejected() {
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("has space").is_err());
        let short = NewAdmin {
            username: "owner".to_string(),
            password: "short".to_string(),
            role: AdminRole::Admin,
        };
        assert_eq!(
            short.into_admin(Utc::now()),
            Err(DomainError::validation("password must be at least 8 characters"))
        );
    }
}
