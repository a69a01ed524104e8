use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

use herbstore_core::{AddressId, CustomerId, Mobile, Pincode};
use herbstore_customers::{Address, AddressPatch, Customer, CustomerFilter, CustomerPatch, NewAddress};

use super::{like_pattern, page_i64, PostgresStore};
use crate::error::{decode, map_sqlx_error, StoreError, StoreResult};
use crate::store::{AddressStore, CustomerStore};

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    mobile: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            mobile: decode("customer.mobile", Mobile::parse(&row.mobile))?,
            is_active: row.is_active,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AddressRow {
    id: Uuid,
    customer_id: Uuid,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    pincode: String,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AddressRow> for Address {
    type Error = StoreError;

    fn try_from(row: AddressRow) -> Result<Self, Self::Error> {
        Ok(Address {
            id: AddressId::from_uuid(row.id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            address_line1: row.address_line1,
            address_line2: row.address_line2,
            city: row.city,
            state: row.state,
            pincode: decode("address.pincode", Pincode::parse(&row.pincode))?,
            country: row.country,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

async fn lock_customer(conn: &mut PgConnection, id: CustomerId) -> StoreResult<Customer> {
    sqlx::query_as::<_, CustomerRow>(
        r#"
        SELECT id, name, email, mobile, is_active, last_login, created_at, updated_at
        FROM customer
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(conn)
    .await
    .map_err(|e| map_sqlx_error("lock_customer", e))?
    .ok_or_else(|| StoreError::not_found("customer"))?
    .try_into()
}

async fn lock_address(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    address_id: AddressId,
) -> StoreResult<Address> {
    sqlx::query_as::<_, AddressRow>(
        r#"
        SELECT id, customer_id, address_line1, address_line2, city, state, pincode, country,
               is_default, created_at, updated_at
        FROM address
        WHERE id = $1 AND customer_id = $2
        FOR UPDATE
        "#,
    )
    .bind(address_id.as_uuid())
    .bind(customer_id.as_uuid())
    .fetch_optional(conn)
    .await
    .map_err(|e| map_sqlx_error("lock_address", e))?
    .ok_or_else(|| StoreError::not_found("address"))?
    .try_into()
}

/// Clear the default flag on every other address of the customer.
async fn unset_other_defaults(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    keep: AddressId,
) -> StoreResult<()> {
    sqlx::query("UPDATE address SET is_default = FALSE WHERE customer_id = $1 AND id <> $2 AND is_default")
        .bind(customer_id.as_uuid())
        .bind(keep.as_uuid())
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error("unset_other_defaults", e))?;
    Ok(())
}

async fn write_address(conn: &mut PgConnection, a: &Address) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE address
        SET address_line1 = $2, address_line2 = $3, city = $4, state = $5, pincode = $6,
            country = $7, is_default = $8, updated_at = $9
        WHERE id = $1
        "#,
    )
    .bind(a.id.as_uuid())
    .bind(&a.address_line1)
    .bind(&a.address_line2)
    .bind(&a.city)
    .bind(&a.state)
    .bind(a.pincode.as_str())
    .bind(&a.country)
    .bind(a.is_default)
    .bind(a.updated_at)
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error("write_address", e))?;
    Ok(())
}

#[async_trait]
impl CustomerStore for PostgresStore {
    async fn find_customer(&self, id: CustomerId) -> StoreResult<Option<Customer>> {
        sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, email, mobile, is_active, last_login, created_at, updated_at
            FROM customer
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_customer", e))?
        .map(Customer::try_from)
        .transpose()
    }

    async fn find_customer_by_mobile(&self, mobile: &Mobile) -> StoreResult<Option<Customer>> {
        sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, email, mobile, is_active, last_login, created_at, updated_at
            FROM customer
            WHERE mobile = $1
            "#,
        )
        .bind(mobile.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_customer_by_mobile", e))?
        .map(Customer::try_from)
        .transpose()
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id), err)]
    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customer (id, name, email, mobile, is_active, last_login, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.mobile.as_str())
        .bind(customer.is_active)
        .bind(customer.last_login)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, patch), fields(customer_id = %id), err)]
    async fn update_customer(
        &self,
        id: CustomerId,
        patch: &CustomerPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Customer> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let mut customer = lock_customer(&mut tx, id).await?;
        patch.apply_to(&mut customer, now)?;

        sqlx::query("UPDATE customer SET name = $2, email = $3, is_active = $4, updated_at = $5 WHERE id = $1")
            .bind(customer.id.as_uuid())
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(customer.is_active)
            .bind(customer.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_customer", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(customer)
    }

    async fn record_customer_login(&self, id: CustomerId, now: DateTime<Utc>) -> StoreResult<Customer> {
        sqlx::query_as::<_, CustomerRow>(
            r#"
            UPDATE customer SET last_login = $2, updated_at = $2
            WHERE id = $1
            RETURNING id, name, email, mobile, is_active, last_login, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("record_customer_login", e))?
        .ok_or_else(|| StoreError::not_found("customer"))?
        .try_into()
    }

    async fn list_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>> {
        let (limit, offset) = page_i64(filter.limit, filter.offset);
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, email, mobile, is_active, last_login, created_at, updated_at
            FROM customer
            WHERE ($1::text IS NULL OR name ILIKE $1 OR mobile LIKE $1 OR email ILIKE $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(like_pattern(filter.search.as_deref()))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list_customers", e))?;
        rows.into_iter().map(Customer::try_from).collect()
    }
}

#[async_trait]
impl AddressStore for PostgresStore {
    async fn list_addresses(&self, customer_id: CustomerId) -> StoreResult<Vec<Address>> {
        let rows = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, customer_id, address_line1, address_line2, city, state, pincode, country,
                   is_default, created_at, updated_at
            FROM address
            WHERE customer_id = $1
            ORDER BY is_default DESC, created_at DESC, id DESC
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list_addresses", e))?;
        rows.into_iter().map(Address::try_from).collect()
    }

    async fn find_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> StoreResult<Option<Address>> {
        sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, customer_id, address_line1, address_line2, city, state, pincode, country,
                   is_default, created_at, updated_at
            FROM address
            WHERE id = $1 AND customer_id = $2
            "#,
        )
        .bind(address_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_address", e))?
        .map(Address::try_from)
        .transpose()
    }

    #[instrument(skip(self, input), fields(customer_id = %customer_id), err)]
    async fn insert_address(
        &self,
        customer_id: CustomerId,
        input: NewAddress,
        now: DateTime<Utc>,
    ) -> StoreResult<Address> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        // Every address write takes the customer row lock first, so default
        // swaps for one customer run one at a time.
        lock_customer(&mut tx, customer_id).await?;

        let has_existing: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM address WHERE customer_id = $1)")
                .bind(customer_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_address", e))?;

        let address = input.into_address(customer_id, has_existing, now)?;
        if address.is_default {
            unset_other_defaults(&mut tx, customer_id, address.id).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO address (id, customer_id, address_line1, address_line2, city, state,
                                 pincode, country, is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(address.id.as_uuid())
        .bind(customer_id.as_uuid())
        .bind(&address.address_line1)
        .bind(&address.address_line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(address.pincode.as_str())
        .bind(&address.country)
        .bind(address.is_default)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_address", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(address)
    }

    #[instrument(skip(self, patch), fields(customer_id = %customer_id, address_id = %address_id), err)]
    async fn update_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
        patch: &AddressPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Address> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        lock_customer(&mut tx, customer_id).await?;
        let mut address = lock_address(&mut tx, customer_id, address_id).await?;
        patch.apply_to(&mut address, now)?;
        if patch.makes_default() {
            unset_other_defaults(&mut tx, customer_id, address_id).await?;
        }
        write_address(&mut tx, &address).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(address)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id, address_id = %address_id), err)]
    async fn set_default_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
        now: DateTime<Utc>,
    ) -> StoreResult<Address> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        lock_customer(&mut tx, customer_id).await?;
        let mut address = lock_address(&mut tx, customer_id, address_id).await?;
        unset_other_defaults(&mut tx, customer_id, address_id).await?;
        address.is_default = true;
        address.updated_at = now;
        write_address(&mut tx, &address).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(address)
    }

    #[instrument(skip(self), fields(customer_id = %customer_id, address_id = %address_id), err)]
    async fn delete_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> StoreResult<Address> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        lock_customer(&mut tx, customer_id).await?;
        let removed: Address = sqlx::query_as::<_, AddressRow>(
            r#"
            DELETE FROM address
            WHERE id = $1 AND customer_id = $2
            RETURNING id, customer_id, address_line1, address_line2, city, state, pincode, country,
                      is_default, created_at, updated_at
            "#,
        )
        .bind(address_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_address", e))?
        .ok_or_else(|| StoreError::not_found("address"))?
        .try_into()?;

        if removed.is_default {
            sqlx::query(
                r#"
                UPDATE address SET is_default = TRUE, updated_at = now()
                WHERE id = (
                    SELECT id FROM address
                    WHERE customer_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT 1
                )
                "#,
            )
            .bind(customer_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("promote_default_address", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(removed)
    }
}
