//! In-memory backend.
//!
//! Intended for tests/dev. All tables sit behind one `RwLock`, so every store
//! call is atomic with respect to every other.

mod auth;
mod catalog;
mod customers;
mod orders;

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use herbstore_auth::{AdminUser, Session};
use herbstore_catalog::{Brand, Category, Product};
use herbstore_core::{AddressId, AdminId, BrandId, CategoryId, CustomerId, PaymentId, ProductId};
use herbstore_customers::{Address, Customer};
use herbstore_orders::{Order, OrderDetails, OrderId, OrderItem, Payment};

use crate::error::{StoreError, StoreResult};
use crate::store::page;

#[derive(Debug, Default)]
pub(crate) struct Tables {
    customers: HashMap<CustomerId, Customer>,
    addresses: HashMap<AddressId, Address>,
    categories: HashMap<CategoryId, Category>,
    brands: HashMap<BrandId, Brand>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    order_items: Vec<OrderItem>,
    payments: HashMap<PaymentId, Payment>,
    /// Keyed by token string.
    sessions: HashMap<String, Session>,
    admins: HashMap<AdminId, AdminUser>,
}

impl Tables {
    fn order_details(&self, order: &Order) -> OrderDetails {
        let customer = self.customers.get(&order.customer_id);
        let items = self
            .order_items
            .iter()
            .filter(|i| i.order_id == order.id)
            .map(|i| OrderItem {
                product_name: self.products.get(&i.product_id).map(|p| p.name.clone()),
                ..i.clone()
            })
            .collect();
        OrderDetails {
            order: order.clone(),
            customer_name: customer.map(|c| c.name.clone()),
            customer_mobile: customer.map(|c| c.mobile.as_str().to_string()),
            items,
        }
    }

    /// Owned copies of one customer's addresses, for whole-set edits.
    fn addresses_of(&self, customer_id: CustomerId) -> Vec<Address> {
        self.addresses
            .values()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    pub(crate) fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }
}

/// Apply `limit`/`offset` to an already-sorted listing.
pub(crate) fn paginate<T>(rows: Vec<T>, limit: Option<u32>, offset: Option<u32>) -> Vec<T> {
    let (limit, offset) = page(limit, offset);
    rows.into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}
