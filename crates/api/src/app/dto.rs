//! Request DTOs and their mapping onto domain inputs.
//!
//! Shape checks (required fields, lengths, ranges) live here as `validator`
//! rules; value rules (money, mobile numbers, pincodes, statuses) stay with
//! the domain types the DTOs convert into.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use herbstore_auth::{AdminRole, NewAdmin};
use herbstore_core::{Amount, CustomerId, DomainError, DomainResult, ProductId};
use herbstore_customers::{AddressPatch, CustomerPatch, NewAddress};
use herbstore_orders::{NewOrder, NewOrderItem, OrderFilter, OrderId, OrderPatch, OrderStatus, PaymentFilter, PaymentStatus, StatusUpdate};

// ---- auth ----

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(length(min = 1, message = "mobile is required"))]
    pub mobile: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, message = "mobile is required"))]
    pub mobile: String,
    #[validate(length(min = 1, message = "otp is required"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

// ---- orders ----

/// `Serialize` is required by `validator` for nested collection rules.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
    pub price: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Optional for customers, who always order for themselves.
    pub customer_id: Option<CustomerId>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub shipping_address: serde_json::Value,
    #[validate(length(min = 1, message = "order must contain at least one item"), nested)]
    pub items: Vec<OrderLineRequest>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub prescription_url: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, customer_id: CustomerId) -> DomainResult<NewOrder> {
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, line)| -> DomainResult<NewOrderItem> {
                let quantity = u32::try_from(line.quantity)
                    .map_err(|_| DomainError::validation(format!("items[{idx}].quantity is out of range")))?;
                Ok(NewOrderItem {
                    product_id: line.product_id,
                    quantity,
                    price: Amount::new(line.price)
                        .map_err(|e| DomainError::validation(format!("items[{idx}].price: {e}")))?,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(NewOrder {
            customer_id,
            total_amount: Amount::new(self.total_amount)
                .map_err(|e| DomainError::validation(format!("total_amount: {e}")))?,
            shipping_address: self.shipping_address,
            items,
            transaction_id: self.transaction_id,
            payment_method: self.payment_method,
            notes: self.notes,
            prescription_url: self.prescription_url,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    pub replacement_image: Option<String>,
    pub notes: Option<String>,
}

impl StatusUpdateRequest {
    pub fn into_update(self) -> DomainResult<StatusUpdate> {
        Ok(StatusUpdate {
            status: self.status.parse()?,
            replacement_image: self.replacement_image,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub total_amount: Option<Decimal>,
    pub replacement_image: Option<String>,
}

impl UpdateOrderRequest {
    pub fn into_patch(self) -> DomainResult<OrderPatch> {
        let patch = OrderPatch {
            status: self.status.as_deref().map(str::parse::<OrderStatus>).transpose()?,
            notes: self.notes,
            shipping_address: self.shipping_address,
            total_amount: self.total_amount.map(Amount::new).transpose()?,
            replacement_image: self.replacement_image,
        };
        patch.validate()?;
        Ok(patch)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl OrderListQuery {
    pub fn into_filter(self, customer_id: Option<CustomerId>) -> DomainResult<OrderFilter> {
        Ok(OrderFilter {
            customer_id,
            status: self.status.as_deref().map(str::parse).transpose()?,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

// ---- customers & addresses ----

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateCustomerRequest> for CustomerPatch {
    fn from(req: UpdateCustomerRequest) -> Self {
        CustomerPatch { name: req.name, email: req.email, is_active: req.is_active }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, message = "address_line1 is required"))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "pincode is required"))]
    pub pincode: String,
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl From<CreateAddressRequest> for NewAddress {
    fn from(req: CreateAddressRequest) -> Self {
        NewAddress {
            address_line1: req.address_line1,
            address_line2: req.address_line2,
            city: req.city,
            state: req.state,
            pincode: req.pincode,
            country: req.country,
            is_default: req.is_default,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAddressRequest {
    #[validate(length(min = 1, message = "address_line1 must not be empty"))]
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "city must not be empty"))]
    pub city: Option<String>,
    #[validate(length(min = 1, message = "state must not be empty"))]
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

impl From<UpdateAddressRequest> for AddressPatch {
    fn from(req: UpdateAddressRequest) -> Self {
        AddressPatch {
            address_line1: req.address_line1,
            address_line2: req.address_line2,
            city: req.city,
            state: req.state,
            pincode: req.pincode,
            country: req.country,
            is_default: req.is_default,
        }
    }
}

// ---- payments ----

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListQuery {
    pub order_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PaymentListQuery {
    pub fn into_filter(self) -> DomainResult<PaymentFilter> {
        Ok(PaymentFilter {
            order_id: self.order_id.as_deref().map(OrderId::parse).transpose()?,
            status: self.status.as_deref().map(str::parse::<PaymentStatus>).transpose()?,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentStatusRequest {
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,
}

// ---- admin users ----

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdminRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3 to 50 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[serde(default = "default_admin_role")]
    pub role: AdminRole,
}

fn default_admin_role() -> AdminRole {
    AdminRole::LimitedAdmin
}

impl From<CreateAdminRequest> for NewAdmin {
    fn from(req: CreateAdminRequest) -> Self {
        NewAdmin { username: req.username, password: req.password, role: req.role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_request(body: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn order_request_maps_lines_and_amounts() {
        let product = ProductId::new();
        let req = order_request(json!({
            "total_amount": "199.50",
            "shipping_address": { "city": "Pune" },
            "items": [{ "product_id": product, "quantity": 2, "price": "99.75" }],
            "transaction_id": "TXN-1"
        }));
        assert!(req.validate().is_ok());

        let customer = CustomerId::new();
        let order = req.into_new_order(customer).unwrap();
        assert_eq!(order.customer_id, customer);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[0].product_id, product);
        assert_eq!(order.total_amount.value(), Decimal::new(19950, 2));
    }

    #[test]
    fn order_request_rejects_empty_items_and_zero_quantity() {
        let empty = order_request(json!({ "total_amount": 10, "items": [] }));
        assert!(empty.validate().is_err());

        let zero = order_request(json!({
            "total_amount": 10,
            "items": [{ "product_id": ProductId::new(), "quantity": 0, "price": 10 }]
        }));
        assert!(zero.validate().is_err());
    }

    #[test]
    fn negative_amounts_are_domain_errors() {
        let req = order_request(json!({
            "total_amount": "-1",
            "items": [{ "product_id": ProductId::new(), "quantity": 1, "price": 1 }]
        }));
        assert!(req.into_new_order(CustomerId::new()).is_err());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let req = StatusUpdateRequest { status: "shipped".into(), replacement_image: None, notes: None };
        let err = req.into_update().unwrap_err();
        assert!(err.to_string().starts_with("Invalid status. Must be one of:"));
    }

    #[test]
    fn admin_request_defaults_to_limited_role() {
        let req: CreateAdminRequest =
            serde_json::from_value(json!({ "username": "packer", "password": "longenough" })).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.role, AdminRole::LimitedAdmin);
    }
}
