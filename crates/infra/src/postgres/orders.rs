use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

use herbstore_core::{Amount, CustomerId, DomainError, PaymentId, ProductId};
use herbstore_orders::{
    Order, OrderDetails, OrderDraft, OrderFilter, OrderId, OrderItem, OrderPatch, OrderStatus, Payment,
    PaymentFilter, PaymentStatus,
};

use super::{page_i64, PostgresStore};
use crate::error::{decode, map_sqlx_error, StoreError, StoreResult};
use crate::store::{OrderStore, PaymentStore};

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.customer_id, o.total_amount, o.shipping_address, o.status, o.notes,
           o.prescription_url, o.replacement_image, o.order_date, o.updated_at,
           c.name AS customer_name, c.mobile AS customer_mobile
    FROM orders o
    LEFT JOIN customer c ON c.id = o.customer_id
"#;

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    customer_id: Uuid,
    total_amount: Decimal,
    shipping_address: serde_json::Value,
    status: String,
    notes: Option<String>,
    prescription_url: Option<String>,
    replacement_image: Option<String>,
    order_date: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    customer_name: Option<String>,
    customer_mobile: Option<String>,
}

impl OrderRow {
    fn into_details(self, items: Vec<OrderItem>) -> StoreResult<OrderDetails> {
        let order = Order {
            id: decode("orders.id", OrderId::parse(&self.id))?,
            customer_id: CustomerId::from_uuid(self.customer_id),
            total_amount: decode("orders.total_amount", Amount::new(self.total_amount))?,
            shipping_address: self.shipping_address,
            status: decode("orders.status", self.status.parse::<OrderStatus>())?,
            notes: self.notes,
            prescription_url: self.prescription_url,
            replacement_image: self.replacement_image,
            order_date: self.order_date,
            updated_at: self.updated_at,
        };
        Ok(OrderDetails {
            order,
            customer_name: self.customer_name,
            customer_mobile: self.customer_mobile,
            items,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: Uuid,
    quantity: i32,
    price: Decimal,
    product_name: Option<String>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem {
            order_id: decode("order_item.order_id", OrderId::parse(&row.order_id))?,
            product_id: ProductId::from_uuid(row.product_id),
            quantity: decode("order_item.quantity", u32::try_from(row.quantity))?,
            price: decode("order_item.price", Amount::new(row.price))?,
            product_name: row.product_name,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: String,
    transaction_id: String,
    amount: Decimal,
    method: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            order_id: decode("payment.order_id", OrderId::parse(&row.order_id))?,
            transaction_id: row.transaction_id,
            amount: decode("payment.amount", Amount::new(row.amount))?,
            method: row.method,
            status: decode("payment.status", row.status.parse::<PaymentStatus>())?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Attach items to a page of orders with one batched query.
async fn with_items(conn: &mut PgConnection, rows: Vec<OrderRow>) -> StoreResult<Vec<OrderDetails>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT oi.order_id, oi.product_id, oi.quantity, oi.price, p.name AS product_name
        FROM order_item oi
        LEFT JOIN product p ON p.id = oi.product_id
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.id
        "#,
    )
    .bind(&ids)
    .fetch_all(conn)
    .await
    .map_err(|e| map_sqlx_error("load_order_items", e))?;

    let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let key = row.order_id.clone();
        by_order.entry(key).or_default().push(row.try_into()?);
    }

    rows.into_iter()
        .map(|row| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            row.into_details(items)
        })
        .collect()
}

async fn load_order(conn: &mut PgConnection, id: &OrderId) -> StoreResult<Option<OrderDetails>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;
    match row {
        Some(row) => Ok(with_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(skip(self, draft), fields(order_id = %draft.order.id, customer_id = %draft.order.customer_id), err)]
    async fn create_order(&self, draft: OrderDraft) -> StoreResult<OrderDetails> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let order = &draft.order;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, total_amount, shipping_address, status, notes,
                                prescription_url, replacement_image, order_date, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.customer_id.as_uuid())
        .bind(order.total_amount.value())
        .bind(&order.shipping_address)
        .bind(order.status.as_str())
        .bind(&order.notes)
        .bind(&order.prescription_url)
        .bind(&order.replacement_image)
        .bind(order.order_date)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        if let Some(payment) = &draft.payment {
            sqlx::query(
                r#"
                INSERT INTO payment (id, order_id, transaction_id, amount, method, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(payment.id.as_uuid())
            .bind(payment.order_id.as_str())
            .bind(&payment.transaction_id)
            .bind(payment.amount.value())
            .bind(&payment.method)
            .bind(payment.status.as_str())
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment", e))?;
        }

        for item in &draft.items {
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| DomainError::validation("quantity too large"))?;
            sqlx::query("INSERT INTO order_item (order_id, product_id, quantity, price) VALUES ($1, $2, $3, $4)")
                .bind(item.order_id.as_str())
                .bind(item.product_id.as_uuid())
                .bind(quantity)
                .bind(item.price.value())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }

        let details = load_order(&mut tx, &order.id)
            .await?
            .ok_or_else(|| StoreError::not_found("order"))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(details)
    }

    async fn find_order(&self, id: &OrderId) -> StoreResult<Option<OrderDetails>> {
        let mut conn = self.pool().acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        load_order(&mut conn, id).await
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>> {
        let (limit, offset) = page_i64(filter.limit, filter.offset);
        let mut conn = self.pool().acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"{ORDER_SELECT}
            WHERE ($1::uuid IS NULL OR o.customer_id = $1)
              AND ($2::text IS NULL OR o.status = $2)
            ORDER BY o.order_date DESC, o.id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.customer_id.map(|c| *c.as_uuid()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;
        with_items(&mut conn, rows).await
    }

    #[instrument(skip(self, patch), fields(order_id = %id), err)]
    async fn update_order(
        &self,
        id: &OrderId,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<OrderDetails> {
        patch.validate()?;
        let mut conn = self.pool().acquire().await.map_err(|e| map_sqlx_error("acquire", e))?;
        let updated: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = COALESCE($2, status),
                notes = COALESCE($3, notes),
                shipping_address = COALESCE($4, shipping_address),
                total_amount = COALESCE($5, total_amount),
                replacement_image = COALESCE($6, replacement_image),
                updated_at = $7
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id.as_str())
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.notes)
        .bind(&patch.shipping_address)
        .bind(patch.total_amount.map(|a| a.value()))
        .bind(&patch.replacement_image)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        if updated.is_none() {
            return Err(StoreError::not_found("order"));
        }
        load_order(&mut conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("order"))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn delete_order(&self, id: &OrderId) -> StoreResult<OrderDetails> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?
            .ok_or_else(|| StoreError::not_found("order"))?;
        let details = load_order(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("order"))?;

        for (table, sql) in [
            ("payment", "DELETE FROM payment WHERE order_id = $1"),
            ("order_item", "DELETE FROM order_item WHERE order_id = $1"),
            ("orders", "DELETE FROM orders WHERE id = $1"),
        ] {
            sqlx::query(sql)
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(&format!("delete_order.{table}"), e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(details)
    }
}

#[async_trait]
impl PaymentStore for PostgresStore {
    async fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>> {
        let (limit, offset) = page_i64(filter.limit, filter.offset);
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, order_id, transaction_id, amount, method, status, created_at, updated_at
            FROM payment
            WHERE ($1::text IS NULL OR order_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.order_id.as_ref().map(|o| o.as_str().to_string()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list_payments", e))?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    #[instrument(skip(self), fields(payment_id = %id, status = status.as_str()), err)]
    async fn update_payment_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Payment> {
        sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payment SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, order_id, transaction_id, amount, method, status, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("update_payment_status", e))?
        .ok_or_else(|| StoreError::not_found("payment"))?
        .try_into()
    }
}
