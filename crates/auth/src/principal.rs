use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herbstore_core::{AdminId, CustomerId};

use crate::AdminRole;

/// The authenticated caller of a request, resolved from one session lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Principal {
    Admin { id: AdminId, role: AdminRole },
    Customer { id: CustomerId },
}

/// Discriminator stored next to each session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Admin,
    Customer,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Admin => "admin",
            PrincipalKind::Customer => "customer",
        }
    }
}

impl core::str::FromStr for PrincipalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(PrincipalKind::Admin),
            "customer" => Ok(PrincipalKind::Customer),
            other => Err(format!("unknown principal type '{other}'")),
        }
    }
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Admin { .. } => PrincipalKind::Admin,
            Principal::Customer { .. } => PrincipalKind::Customer,
        }
    }

    /// Raw id of the admin or customer row.
    pub fn subject(&self) -> Uuid {
        match self {
            Principal::Admin { id, .. } => *id.as_uuid(),
            Principal::Customer { id } => *id.as_uuid(),
        }
    }

    pub fn role(&self) -> Option<AdminRole> {
        match self {
            Principal::Admin { role, .. } => Some(*role),
            Principal::Customer { .. } => None,
        }
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        match self {
            Principal::Customer { id } => Some(*id),
            Principal::Admin { .. } => None,
        }
    }

    pub fn admin_id(&self) -> Option<AdminId> {
        match self {
            Principal::Admin { id, .. } => Some(*id),
            Principal::Customer { .. } => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let p = Principal::Customer { id: CustomerId::new() };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "customer");

        let a = Principal::Admin { id: AdminId::new(), role: AdminRole::LimitedAdmin };
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "admin");
        assert_eq!(json["role"], "limited_admin");
    }

    #[test]
    fn accessors_follow_variant() {
        let id = CustomerId::new();
        let p = Principal::Customer { id };
        assert_eq!(p.kind(), PrincipalKind::Customer);
        assert_eq!(p.customer_id(), Some(id));
        assert_eq!(p.role(), None);
        assert_eq!(p.subject(), *id.as_uuid());
    }
}
