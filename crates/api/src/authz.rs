//! Handler-side authorization checks.
//!
//! Route guards only separate admins from customers; these helpers apply the
//! role permissions and record ownership.

use herbstore_auth::{authorize, authorize_customer_access, Permission};
use herbstore_core::CustomerId;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

/// Admin holding `permission`.
pub fn require_permission(ctx: &PrincipalContext, permission: &Permission) -> Result<(), ApiError> {
    authorize(ctx.principal(), permission).map_err(|err| {
        tracing::debug!(permission = permission.as_str(), error = %err, "permission denied");
        ApiError::from(err)
    })
}

/// The owning customer, or an admin holding `admin_permission`.
pub fn require_owner_or(
    ctx: &PrincipalContext,
    owner: CustomerId,
    admin_permission: &Permission,
) -> Result<(), ApiError> {
    Ok(authorize_customer_access(ctx.principal(), owner, admin_permission)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herbstore_auth::{permissions, AdminRole, Principal, SessionToken};
    use herbstore_core::AdminId;

    fn ctx(principal: Principal) -> PrincipalContext {
        PrincipalContext::new(principal, SessionToken::generate(), Utc::now())
    }

    #[test]
    fn limited_admin_cannot_delete_orders() {
        let c = ctx(Principal::Admin { id: AdminId::new(), role: AdminRole::LimitedAdmin });
        assert!(require_permission(&c, &permissions::ORDERS_READ).is_ok());
        assert!(matches!(
            require_permission(&c, &permissions::ORDERS_DELETE),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn customers_only_reach_their_own_records() {
        let me = CustomerId::new();
        let c = ctx(Principal::Customer { id: me });
        assert!(require_owner_or(&c, me, &permissions::ORDERS_READ).is_ok());
        assert!(require_owner_or(&c, CustomerId::new(), &permissions::ORDERS_READ).is_err());
    }
}
