use core::str::FromStr;

use serde::{Deserialize, Serialize};

use herbstore_core::DomainError;

use crate::Permission;
use crate::permissions;

/// Back-office role.
///
/// Customers have no role; they are only ever allowed to touch their own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access, including deletes and admin management.
    Admin,
    /// Day-to-day operations: order status, stock, read-only customers/payments.
    LimitedAdmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Admin => "admin",
            AdminRole::LimitedAdmin => "limited_admin",
        }
    }

    /// Permissions granted by this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            AdminRole::Admin => permissions::FULL_ADMIN,
            AdminRole::LimitedAdmin => permissions::LIMITED_ADMIN,
        }
    }
}

impl FromStr for AdminRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AdminRole::Admin),
            "limited_admin" => Ok(AdminRole::LimitedAdmin),
            other => Err(DomainError::validation(format!(
                "role must be one of: admin, limited_admin (got '{other}')"
            ))),
        }
    }
}

impl core::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_roles_and_rejects_others() {
        assert_eq!("admin".parse::<AdminRole>().unwrap(), AdminRole::Admin);
        assert_eq!("limited_admin".parse::<AdminRole>().unwrap(), AdminRole::LimitedAdmin);
        assert!("superuser".parse::<AdminRole>().is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&AdminRole::LimitedAdmin).unwrap(), "\"limited_admin\"");
    }
}
