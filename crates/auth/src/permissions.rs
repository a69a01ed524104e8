use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "orders.read").
/// The wildcard permission `"*"` grants everything and is what full admins hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ALL: Permission = Permission::from_static("*");

pub const ORDERS_READ: Permission = Permission::from_static("orders.read");
pub const ORDERS_UPDATE_STATUS: Permission = Permission::from_static("orders.update_status");
pub const ORDERS_WRITE: Permission = Permission::from_static("orders.write");
pub const ORDERS_DELETE: Permission = Permission::from_static("orders.delete");

pub const CUSTOMERS_READ: Permission = Permission::from_static("customers.read");
pub const CUSTOMERS_WRITE: Permission = Permission::from_static("customers.write");

pub const CATALOG_READ: Permission = Permission::from_static("catalog.read");
pub const CATALOG_WRITE: Permission = Permission::from_static("catalog.write");
pub const CATALOG_STOCK: Permission = Permission::from_static("catalog.stock");

pub const PAYMENTS_READ: Permission = Permission::from_static("payments.read");
pub const PAYMENTS_WRITE: Permission = Permission::from_static("payments.write");

pub const ADMINS_MANAGE: Permission = Permission::from_static("admins.manage");

/// Grants of the `admin` role.
pub const FULL_ADMIN: &[Permission] = &[ALL];

/// Grants of the `limited_admin` role.
pub const LIMITED_ADMIN: &[Permission] = &[
    ORDERS_READ,
    ORDERS_UPDATE_STATUS,
    CUSTOMERS_READ,
    CATALOG_READ,
    CATALOG_STOCK,
    PAYMENTS_READ,
];
