use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herbstore_core::PaymentId;
use herbstore_orders::{
    OrderDetails, OrderDraft, OrderFilter, OrderId, OrderPatch, Payment, PaymentFilter, PaymentStatus,
};

use super::{paginate, InMemoryStore};
use crate::error::{StoreError, StoreResult};
use crate::store::{OrderStore, PaymentStore};

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, draft: OrderDraft) -> StoreResult<OrderDetails> {
        let mut t = self.write()?;

        // Same checks the foreign keys and unique constraints make in Postgres,
        // all before the first insert.
        if !t.customers.contains_key(&draft.order.customer_id) {
            return Err(StoreError::ForeignKey(format!(
                "customer {} does not exist",
                draft.order.customer_id
            )));
        }
        if let Some(missing) = draft.items.iter().find(|i| !t.products.contains_key(&i.product_id)) {
            return Err(StoreError::ForeignKey(format!(
                "product {} does not exist",
                missing.product_id
            )));
        }
        if t.orders.contains_key(&draft.order.id) {
            return Err(StoreError::Conflict("order id already exists".to_string()));
        }
        if let Some(payment) = &draft.payment {
            if t.payments.values().any(|p| p.transaction_id == payment.transaction_id) {
                return Err(StoreError::Conflict("transaction id already recorded".to_string()));
            }
        }

        let order_id = draft.order.id.clone();
        t.orders.insert(order_id.clone(), draft.order);
        if let Some(payment) = draft.payment {
            t.payments.insert(payment.id, payment);
        }
        t.order_items.extend(draft.items);

        let order = t
            .orders
            .get(&order_id)
            .ok_or_else(|| StoreError::not_found("order"))?;
        Ok(t.order_details(order))
    }

    async fn find_order(&self, id: &OrderId) -> StoreResult<Option<OrderDetails>> {
        let t = self.read()?;
        Ok(t.orders.get(id).map(|o| t.order_details(o)))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>> {
        let t = self.read()?;
        let mut rows: Vec<_> = t.orders.values().filter(|o| filter.matches(o)).collect();
        rows.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(b.id.cmp(&a.id)));
        let page = paginate(rows, filter.limit, filter.offset);
        Ok(page.into_iter().map(|o| t.order_details(o)).collect())
    }

    async fn update_order(
        &self,
        id: &OrderId,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<OrderDetails> {
        let mut t = self.write()?;
        let order = t.orders.get_mut(id).ok_or_else(|| StoreError::not_found("order"))?;
        let mut updated = order.clone();
        patch.apply_to(&mut updated, now)?;
        *order = updated;

        let order = t.orders.get(id).ok_or_else(|| StoreError::not_found("order"))?;
        Ok(t.order_details(order))
    }

    async fn delete_order(&self, id: &OrderId) -> StoreResult<OrderDetails> {
        let mut t = self.write()?;
        let order = t.orders.get(id).ok_or_else(|| StoreError::not_found("order"))?;
        let details = t.order_details(order);

        t.payments.retain(|_, p| &p.order_id != id);
        t.order_items.retain(|i| &i.order_id != id);
        t.orders.remove(id);
        Ok(details)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>> {
        let t = self.read()?;
        let mut rows: Vec<Payment> = t
            .payments
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, filter.limit, filter.offset))
    }

    async fn update_payment_status(
        &self,
        id: PaymentId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Payment> {
        let mut t = self.write()?;
        let payment = t
            .payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("payment"))?;
        payment.set_status(status, now);
        Ok(payment.clone())
    }
}
