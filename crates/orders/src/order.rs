use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use herbstore_core::{Amount, CustomerId, DomainError, DomainResult, Entity, PaymentId, ProductId};

use crate::payment::{Payment, PaymentStatus};

const ORDER_ID_PREFIX: &str = "HERB";
const ORDER_ID_SUFFIX_LEN: usize = 6;
const ORDER_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Order identifier: `HERB-<unix millis>-<6 uppercase alphanumerics>`.
///
/// Parsing is lenient about the shape so ids minted by older tooling
/// (e.g. `ORD-...`) can still be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ORDER_ID_SUFFIX_LEN)
            .map(|_| ORDER_ID_ALPHABET[rng.gen_range(0..ORDER_ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("{ORDER_ID_PREFIX}-{}-{suffix}", now.timestamp_millis()))
    }

    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= 64
            && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DomainError::invalid_id(format!("OrderId: '{raw}'")));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order status.
///
/// Usual flow: `Ordered → {Shipped, Replacement, Cancelled} → {Delivered,
/// Refunded, Cancelled}`, with `Replacement → {Shipped, Delivered, Cancelled,
/// Refunded}`. Transitions are not enforced: the back office may set any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Ordered,
    Shipped,
    Delivered,
    Replacement,
    Refunded,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Ordered,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Replacement,
        OrderStatus::Refunded,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ordered => "Ordered",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Replacement => "Replacement",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Statuses a customer may set on their own order from the storefront.
    pub fn is_customer_requestable(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Replacement)
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(
                    "Invalid status. Must be one of: Ordered, Shipped, Delivered, Replacement, Refunded, Cancelled",
                )
            })
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub total_amount: Amount,
    /// Snapshot of the delivery address at checkout (object or free text).
    pub shipping_address: serde_json::Value,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub prescription_url: Option<String>,
    pub replacement_image: Option<String>,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Order line: product, quantity and the unit price charged at order time.
///
/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Amount,
    /// Filled from the catalog on reads; not stored with the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

/// Order with its customer and lines, as returned by read endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub customer_name: Option<String>,
    pub customer_mobile: Option<String>,
    pub items: Vec<OrderItem>,
}

/// Requested order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Amount,
}

/// Checkout request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub total_amount: Amount,
    pub shipping_address: serde_json::Value,
    pub items: Vec<NewOrderItem>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub prescription_url: Option<String>,
}

/// Rows to insert for one order, all in the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
}

impl NewOrder {
    pub fn validate(&self) -> DomainResult<()> {
        if self.total_amount.is_zero() {
            return Err(DomainError::validation("total_amount must be greater than zero"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "items[{idx}].quantity must be positive"
                )));
            }
            if item.price.times(item.quantity).is_none() {
                return Err(DomainError::validation(format!("items[{idx}] total overflows")));
            }
        }
        let address_present = match &self.shipping_address {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            serde_json::Value::Object(m) => !m.is_empty(),
            _ => false,
        };
        if !address_present {
            return Err(DomainError::validation(
                "shipping_address must be an address object or a non-empty string",
            ));
        }
        if let Some(txn) = &self.transaction_id {
            if txn.trim().is_empty() {
                return Err(DomainError::validation("transaction_id must not be blank"));
            }
        }
        Ok(())
    }

    /// Validate and turn the request into rows. New orders always start as `Ordered`.
    pub fn into_draft(self, now: DateTime<Utc>) -> DomainResult<OrderDraft> {
        self.validate()?;

        let order_id = OrderId::generate(now);
        let payment = self.transaction_id.map(|txn| Payment {
            id: PaymentId::new(),
            order_id: order_id.clone(),
            transaction_id: txn.trim().to_string(),
            amount: self.total_amount,
            method: self
                .payment_method
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "online".to_string()),
            status: PaymentStatus::Completed,
            created_at: now,
            updated_at: now,
        });

        let items = self
            .items
            .into_iter()
            .map(|i| OrderItem {
                order_id: order_id.clone(),
                product_id: i.product_id,
                quantity: i.quantity,
                price: i.price,
                product_name: None,
            })
            .collect();

        let order = Order {
            id: order_id,
            customer_id: self.customer_id,
            total_amount: self.total_amount,
            shipping_address: self.shipping_address,
            status: OrderStatus::Ordered,
            notes: non_blank(self.notes),
            prescription_url: non_blank(self.prescription_url),
            replacement_image: None,
            order_date: now,
            updated_at: now,
        };

        Ok(OrderDraft { order, items, payment })
    }
}

/// Status change request (storefront and back office).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub replacement_image: Option<String>,
    pub notes: Option<String>,
}

impl From<StatusUpdate> for OrderPatch {
    fn from(value: StatusUpdate) -> Self {
        OrderPatch {
            status: Some(value.status),
            notes: value.notes,
            replacement_image: value.replacement_image,
            ..Default::default()
        }
    }
}

/// Partial update of an order header; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub total_amount: Option<Amount>,
    pub replacement_image: Option<String>,
}

impl OrderPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(total) = &self.total_amount {
            if total.is_zero() {
                return Err(DomainError::validation("total_amount must be greater than zero"));
            }
        }
        if let Some(serde_json::Value::Null) = &self.shipping_address {
            return Err(DomainError::validation("shipping_address must not be null"));
        }
        Ok(())
    }

    pub fn apply_to(&self, order: &mut Order, now: DateTime<Utc>) -> DomainResult<()> {
        self.validate()?;
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(notes) = &self.notes {
            order.notes = Some(notes.clone());
        }
        if let Some(address) = &self.shipping_address {
            order.shipping_address = address.clone();
        }
        if let Some(total) = self.total_amount {
            order.total_amount = total;
        }
        if let Some(image) = &self.replacement_image {
            order.replacement_image = Some(image.clone());
        }
        order.updated_at = now;
        Ok(())
    }
}

/// Listing filter for the back office and order history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl OrderFilter {
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self { customer_id: Some(customer_id), ..Default::default() }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.is_none_or(|c| c == order.customer_id)
            && self.status.is_none_or(|s| s == order.status)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn amount(paise: i64) -> Amount {
        Amount::new(Decimal::new(paise, 2)).unwrap()
    }

    fn new_order(items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            customer_id: CustomerId::new(),
            total_amount: amount(29900),
            shipping_address: json!({ "address_line1": "12 MG Road", "city": "Bengaluru", "pincode": "560001" }),
            items,
            transaction_id: None,
            payment_method: None,
            notes: None,
            prescription_url: None,
        }
    }

    fn item(qty: u32) -> NewOrderItem {
        NewOrderItem { product_id: ProductId::new(), quantity: qty, price: amount(9900) }
    }

    #[test]
    fn draft_starts_ordered_with_all_items() {
        let draft = new_order(vec![item(1), item(2)]).into_draft(Utc::now()).unwrap();
        assert_eq!(draft.order.status, OrderStatus::Ordered);
        assert_eq!(draft.items.len(), 2);
        assert!(draft.items.iter().all(|i| i.order_id == draft.order.id));
        assert!(draft.payment.is_none());
        assert!(draft.order.id.as_str().starts_with("HERB-"));
    }

    #[test]
    fn transaction_id_creates_payment_row() {
        let mut req = new_order(vec![item(1)]);
        req.transaction_id = Some("TXN123".to_string());
        req.payment_method = Some("upi".to_string());
        let draft = req.into_draft(Utc::now()).unwrap();
        let payment = draft.payment.unwrap();
        assert_eq!(payment.order_id, draft.order.id);
        assert_eq!(payment.transaction_id, "TXN123");
        assert_eq!(payment.method, "upi");
        assert_eq!(payment.amount, draft.order.total_amount);
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    #[test]
    fn validation_rejects_empty_and_zero_quantity_orders() {
        assert!(new_order(vec![]).validate().is_err());
        assert!(new_order(vec![item(1), item(0)]).validate().is_err());

        let mut req = new_order(vec![item(1)]);
        req.total_amount = Amount::ZERO;
        assert!(req.validate().is_err());

        let mut req = new_order(vec![item(1)]);
        req.shipping_address = json!("   ");
        assert!(req.validate().is_err());

        let mut req = new_order(vec![item(1)]);
        req.shipping_address = json!("12 MG Road, Bengaluru 560001");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn status_parse_accepts_exactly_six_values() {
        for st in OrderStatus::ALL {
            assert_eq!(st.as_str().parse::<OrderStatus>().unwrap(), st);
        }
        assert!("Pending".parse::<OrderStatus>().is_err());
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn status_serializes_with_exact_names() {
        assert_eq!(serde_json::to_string(&OrderStatus::Replacement).unwrap(), "\"Replacement\"");
        assert!(serde_json::from_str::<OrderStatus>("\"Lost\"").is_err());
    }

    #[test]
    fn any_status_may_follow_any_other() {
        let mut order = new_order(vec![item(1)]).into_draft(Utc::now()).unwrap().order;
        for st in [OrderStatus::Delivered, OrderStatus::Ordered, OrderStatus::Refunded] {
            OrderPatch { status: Some(st), ..Default::default() }
                .apply_to(&mut order, Utc::now())
                .unwrap();
            assert_eq!(order.status, st);
        }
    }

    #[test]
    fn status_update_keeps_unspecified_fields() {
        let mut order = new_order(vec![item(1)]).into_draft(Utc::now()).unwrap().order;
        order.notes = Some("leave at door".to_string());
        let before_total = order.total_amount;

        let patch: OrderPatch = StatusUpdate {
            status: OrderStatus::Replacement,
            replacement_image: Some("https://cdn.example/img.jpg".to_string()),
            notes: None,
        }
        .into();
        patch.apply_to(&mut order, Utc::now()).unwrap();

        assert_eq!(order.status, OrderStatus::Replacement);
        assert_eq!(order.notes.as_deref(), Some("leave at door"));
        assert_eq!(order.replacement_image.as_deref(), Some("https://cdn.example/img.jpg"));
        assert_eq!(order.total_amount, before_total);
    }

    #[test]
    fn customers_may_only_cancel_or_request_replacement() {
        let requestable: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_customer_requestable)
            .collect();
        assert_eq!(requestable, vec![OrderStatus::Replacement, OrderStatus::Cancelled]);
    }

    #[test]
    fn filter_by_customer_and_status() {
        let order = new_order(vec![item(1)]).into_draft(Utc::now()).unwrap().order;
        assert!(OrderFilter::for_customer(order.customer_id).matches(&order));
        assert!(!OrderFilter::for_customer(CustomerId::new()).matches(&order));
        let shipped = OrderFilter { status: Some(OrderStatus::Shipped), ..Default::default() };
        assert!(!shipped.matches(&order));
    }

    #[test]
    fn order_id_parse_accepts_legacy_prefix() {
        assert!(OrderId::parse("ORD-1700000000000-AB12CD").is_ok());
        assert!(OrderId::parse("").is_err());
        assert!(OrderId::parse("HERB 1").is_err());
    }

    proptest! {
        #[test]
        fn generated_order_ids_have_expected_shape(millis in 0i64..4_000_000_000_000i64) {
            let now = DateTime::<Utc>::from_timestamp_millis(millis).unwrap();
            let id = OrderId::generate(now);
            let parts: Vec<&str> = id.as_str().split('-').collect();
            prop_assert_eq!(parts.len(), 3);
            prop_assert_eq!(parts[0], "HERB");
            prop_assert_eq!(parts[1], millis.to_string());
            prop_assert_eq!(parts[2].len(), 6);
            prop_assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            prop_assert!(OrderId::parse(id.as_str()).is_ok());
        }
    }
}
