//! Store abstractions used by the HTTP layer.
//!
//! Each concern gets its own trait so handlers depend only on what they use.
//! Both backends (`memory`, `postgres`) implement all of them, and `Store`
//! bundles them behind one trait object.
//!
//! Multi-step writes (order + payment + items, default-address swap, order
//! delete, session replace) are single calls here so each backend can make
//! them atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herbstore_auth::{AdminUser, Session, SessionToken};
use herbstore_catalog::{Brand, Category, Product, ProductFilter, ProductPatch, StockAdjustment};
use herbstore_core::{AddressId, AdminId, CustomerId, Mobile, PaymentId, ProductId};
use herbstore_customers::{Address, AddressPatch, Customer, CustomerFilter, CustomerPatch, NewAddress};
use herbstore_orders::{OrderDetails, OrderDraft, OrderFilter, OrderId, OrderPatch, Payment, PaymentFilter, PaymentStatus};

use crate::error::StoreResult;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Clamp a requested page to sane bounds: `(limit, offset)`.
pub fn page(limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0),
    )
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find_customer(&self, id: CustomerId) -> StoreResult<Option<Customer>>;

    async fn find_customer_by_mobile(&self, mobile: &Mobile) -> StoreResult<Option<Customer>>;

    /// `Conflict` if the mobile is already registered.
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()>;

    async fn update_customer(
        &self,
        id: CustomerId,
        patch: &CustomerPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Customer>;

    async fn record_customer_login(&self, id: CustomerId, now: DateTime<Utc>) -> StoreResult<Customer>;

    /// Newest first.
    async fn list_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>>;
}

#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Default first, then newest.
    async fn list_addresses(&self, customer_id: CustomerId) -> StoreResult<Vec<Address>>;

    async fn find_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> StoreResult<Option<Address>>;

    /// Insert, making it the default when requested or when it is the first one.
    async fn insert_address(
        &self,
        customer_id: CustomerId,
        input: NewAddress,
        now: DateTime<Utc>,
    ) -> StoreResult<Address>;

    async fn update_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
        patch: &AddressPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Address>;

    async fn set_default_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
        now: DateTime<Utc>,
    ) -> StoreResult<Address>;

    /// Remove an address; when it was the default, the newest remaining one takes over.
    async fn delete_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> StoreResult<Address>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert order, optional payment and all items atomically.
    async fn create_order(&self, draft: OrderDraft) -> StoreResult<OrderDetails>;

    async fn find_order(&self, id: &OrderId) -> StoreResult<Option<OrderDetails>>;

    /// Newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>>;

    async fn update_order(
        &self,
        id: &OrderId,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<OrderDetails>;

    /// Remove payments, items and the order row atomically; returns what was deleted.
    async fn delete_order(&self, id: &OrderId) -> StoreResult<OrderDetails>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Newest first.
    async fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>>;

    async fn update_payment_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Payment>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Delete every session of the same principal and insert this one.
    async fn replace_sessions(&self, session: &Session) -> StoreResult<()>;

    async fn find_session(&self, token: &SessionToken) -> StoreResult<Option<Session>>;

    /// `true` if a row was removed.
    async fn delete_session(&self, token: &SessionToken) -> StoreResult<bool>;

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self, include_inactive: bool) -> StoreResult<Vec<Category>>;

    async fn insert_category(&self, category: &Category) -> StoreResult<()>;

    async fn list_brands(&self, include_inactive: bool) -> StoreResult<Vec<Brand>>;

    async fn insert_brand(&self, brand: &Brand) -> StoreResult<()>;

    /// Sorted by name.
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;

    async fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    async fn insert_product(&self, product: &Product) -> StoreResult<()>;

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Product>;

    async fn adjust_stock(
        &self,
        id: ProductId,
        adjustment: StockAdjustment,
        now: DateTime<Utc>,
    ) -> StoreResult<Product>;

    async fn deactivate_product(&self, id: ProductId, now: DateTime<Utc>) -> StoreResult<Product>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_admin(&self, id: AdminId) -> StoreResult<Option<AdminUser>>;

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<AdminUser>>;

    /// `Conflict` if the username is taken.
    async fn insert_admin(&self, admin: &AdminUser) -> StoreResult<()>;

    /// Oldest first.
    async fn list_admins(&self) -> StoreResult<Vec<AdminUser>>;

    async fn record_admin_login(&self, id: AdminId, now: DateTime<Utc>) -> StoreResult<()>;
}

/// Every store concern in one object.
pub trait Store:
    CustomerStore + AddressStore + OrderStore + PaymentStore + SessionStore + CatalogStore + AdminStore
{
}

impl<T> Store for T where
    T: CustomerStore
        + AddressStore
        + OrderStore
        + PaymentStore
        + SessionStore
        + CatalogStore
        + AdminStore
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(page(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page(Some(0), Some(10)), (1, 10));
        assert_eq!(page(Some(10_000), None), (MAX_PAGE_SIZE, 0));
    }
}
