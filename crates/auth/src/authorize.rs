use thiserror::Error;

use herbstore_core::CustomerId;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("admin access required")]
    AdminRequired,

    #[error("customer access required")]
    CustomerRequired,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    #[error("access denied to another customer's data")]
    NotOwner,
}

/// Authorize an admin-only action.
///
/// - No IO
/// - No panics
/// - Customers never hold permissions; they only ever pass `authorize_customer_access`.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let Some(role) = principal.role() else {
        return Err(AuthzError::AdminRequired);
    };

    let granted = role
        .permissions()
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Authorize access to records owned by `owner`.
///
/// The owning customer is always allowed; an admin needs `admin_permission`.
pub fn authorize_customer_access(
    principal: &Principal,
    owner: CustomerId,
    admin_permission: &Permission,
) -> Result<(), AuthzError> {
    match principal {
        Principal::Customer { id } if *id == owner => Ok(()),
        Principal::Customer { .. } => Err(AuthzError::NotOwner),
        Principal::Admin { .. } => authorize(principal, admin_permission),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{permissions, AdminRole};
    use herbstore_core::AdminId;

    fn admin(role: AdminRole) -> Principal {
        Principal::Admin { id: AdminId::new(), role }
    }

    #[test]
    fn full_admin_holds_every_permission() {
        let p = admin(AdminRole::Admin);
        assert!(authorize(&p, &permissions::ORDERS_DELETE).is_ok());
        assert!(authorize(&p, &permissions::ADMINS_MANAGE).is_ok());
    }

    #[test]
    fn limited_admin_can_update_status_but_not_delete() {
        let p = admin(AdminRole::LimitedAdmin);
        assert!(authorize(&p, &permissions::ORDERS_UPDATE_STATUS).is_ok());
        assert_eq!(
            authorize(&p, &permissions::ORDERS_DELETE),
            Err(AuthzError::Forbidden("orders.delete".to_string()))
        );
    }

    #[test]
    fn customers_never_pass_admin_checks() {
        let p = Principal::Customer { id: CustomerId::new() };
        assert_eq!(authorize(&p, &permissions::ORDERS_READ), Err(AuthzError::AdminRequired));
    }

    #[test]
    fn owner_access_rules() {
        let owner = CustomerId::new();
        let me = Principal::Customer { id: owner };
        let other = Principal::Customer { id: CustomerId::new() };

        assert!(authorize_customer_access(&me, owner, &permissions::CUSTOMERS_READ).is_ok());
        assert_eq!(
            authorize_customer_access(&other, owner, &permissions::CUSTOMERS_READ),
            Err(AuthzError::NotOwner)
        );
        assert!(
            authorize_customer_access(&admin(AdminRole::LimitedAdmin), owner, &permissions::CUSTOMERS_READ)
                .is_ok()
        );
        assert!(
            authorize_customer_access(&admin(AdminRole::LimitedAdmin), owner, &permissions::CUSTOMERS_WRITE)
                .is_err()
        );
    }
}
