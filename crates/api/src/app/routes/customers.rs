//! Customer profiles and their saved addresses.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use herbstore_auth::{permissions, Principal};
use herbstore_core::{AddressId, CustomerId};
use herbstore_customers::{AddressPatch, CustomerFilter, CustomerPatch};

use crate::app::dto::{CreateAddressRequest, UpdateAddressRequest, UpdateCustomerRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiQuery, ValidJson};
use crate::app::services::AppServices;
use crate::authz::{require_owner_or, require_permission};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers))
        .route("/:id", get(get_customer).put(update_customer))
        .route("/:id/addresses", get(list_addresses).post(create_address))
        .route("/:id/addresses/:address_id", put(update_address).delete(delete_address))
        .route("/:id/addresses/:address_id/default", put(set_default_address))
}

// ─────────────────────────────────────────────────────────────────────────────
// Customers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/customer
pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ApiQuery(filter): ApiQuery<CustomerFilter>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::CUSTOMERS_READ)?;
    let customers = services.store.list_customers(&filter).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "customers": customers }))).into_response())
}

/// GET /api/customer/:id
pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: CustomerId = id.parse()?;
    require_owner_or(&ctx, id, &permissions::CUSTOMERS_READ)?;

    let customer = services
        .store
        .find_customer(id)
        .await?
        .ok_or_else(|| ApiError::not_found("customer"))?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "customer": customer }))).into_response())
}

/// PUT /api/customer/:id
///
/// Only back-office staff can toggle `is_active`.
pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateCustomerRequest>,
) -> Result<Response, ApiError> {
    let id: CustomerId = id.parse()?;
    require_owner_or(&ctx, id, &permissions::CUSTOMERS_WRITE)?;
    if matches!(ctx.principal(), Principal::Customer { .. }) && body.is_active.is_some() {
        return Err(ApiError::forbidden("customers cannot change their account status"));
    }

    let patch = CustomerPatch::from(body);
    if patch.is_empty() {
        return Err(ApiError::bad_request("nothing to update"));
    }
    let customer = services.store.update_customer(id, &patch, Utc::now()).await?;
    tracing::info!(customer_id = %customer.id, "customer updated");
    Ok((StatusCode::OK, Json(json!({ "success": true, "customer": customer }))).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Addresses
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/customer/:id/addresses (default first, then newest)
pub async fn list_addresses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let customer_id: CustomerId = id.parse()?;
    require_owner_or(&ctx, customer_id, &permissions::CUSTOMERS_READ)?;

    let addresses = services.store.list_addresses(customer_id).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "addresses": addresses }))).into_response())
}

/// POST /api/customer/:id/addresses
pub async fn create_address(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<CreateAddressRequest>,
) -> Result<Response, ApiError> {
    let customer_id: CustomerId = id.parse()?;
    require_owner_or(&ctx, customer_id, &permissions::CUSTOMERS_WRITE)?;

    let address = services
        .store
        .insert_address(customer_id, body.into(), Utc::now())
        .await?;
    tracing::info!(customer_id = %customer_id, address_id = %address.id, is_default = address.is_default, "address added");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "address": address }))).into_response())
}

/// PUT /api/customer/:id/addresses/:address_id
pub async fn update_address(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path((id, address_id)): Path<(String, String)>,
    ValidJson(body): ValidJson<UpdateAddressRequest>,
) -> Result<Response, ApiError> {
    let (customer_id, address_id) = parse_address_path(&id, &address_id)?;
    require_owner_or(&ctx, customer_id, &permissions::CUSTOMERS_WRITE)?;

    let patch = AddressPatch::from(body);
    let address = services
        .store
        .update_address(customer_id, address_id, &patch, Utc::now())
        .await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "address": address }))).into_response())
}

/// PUT /api/customer/:id/addresses/:address_id/default
pub async fn set_default_address(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path((id, address_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (customer_id, address_id) = parse_address_path(&id, &address_id)?;
    require_owner_or(&ctx, customer_id, &permissions::CUSTOMERS_WRITE)?;

    let address = services
        .store
        .set_default_address(customer_id, address_id, Utc::now())
        .await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "address": address }))).into_response())
}

/// DELETE /api/customer/:id/addresses/:address_id
pub async fn delete_address(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path((id, address_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (customer_id, address_id) = parse_address_path(&id, &address_id)?;
    require_owner_or(&ctx, customer_id, &permissions::CUSTOMERS_WRITE)?;

    let removed = services.store.delete_address(customer_id, address_id).await?;
    tracing::info!(customer_id = %customer_id, address_id = %removed.id, "address deleted");
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Address deleted successfully", "address": removed })),
    )
        .into_response())
}

fn parse_address_path(customer_id: &str, address_id: &str) -> Result<(CustomerId, AddressId), ApiError> {
    Ok((customer_id.parse()?, address_id.parse()?))
}
