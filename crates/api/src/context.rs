use chrono::{DateTime, Utc};

use herbstore_auth::{Principal, SessionToken};
use herbstore_core::{AdminId, CustomerId};

/// Authenticated caller of a request, attached by `middleware::authenticate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    token: SessionToken,
    expires_at: DateTime<Utc>,
}

impl PrincipalContext {
    pub fn new(principal: Principal, token: SessionToken, expires_at: DateTime<Utc>) -> Self {
        Self { principal, token, expires_at }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The bearer token this request presented.
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.principal.customer_id()
    }

    pub fn admin_id(&self) -> Option<AdminId> {
        self.principal.admin_id()
    }
}
