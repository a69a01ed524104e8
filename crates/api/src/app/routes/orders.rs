use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use herbstore_auth::{permissions, Principal};
use herbstore_core::CustomerId;
use herbstore_orders::{OrderDetails, OrderId};

use crate::app::dto::{CreateOrderRequest, OrderListQuery, StatusUpdateRequest, UpdateOrderRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery, ValidJson};
use crate::app::services::AppServices;
use crate::authz::{require_owner_or, require_permission};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/customer/:customer_id", get(customer_orders))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/status", patch(update_status))
}

/// GET /api/order (back office)
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::ORDERS_READ)?;
    let orders = services.store.list_orders(&query.into_filter(None)?).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "orders": orders }))).into_response())
}

/// GET /api/order/customer/:customer_id
pub async fn customer_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(customer_id): Path<String>,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> Result<Response, ApiError> {
    let customer_id: CustomerId = customer_id.parse()?;
    require_owner_or(&ctx, customer_id, &permissions::ORDERS_READ)?;

    let orders = services.store.list_orders(&query.into_filter(Some(customer_id))?).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "orders": orders }))).into_response())
}

/// GET /api/order/:id
pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order = load_order(&services, &ctx, &id).await?;
    require_owner_or(&ctx, order.order.customer_id, &permissions::ORDERS_READ)?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "order": order }))).into_response())
}

/// POST /api/order
///
/// Customers order for themselves; back-office staff may place an order for
/// any customer with `orders.write`.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let customer_id = match ctx.principal() {
        Principal::Customer { id } => {
            if body.customer_id.is_some_and(|requested| requested != *id) {
                return Err(ApiError::forbidden("customers may only place orders for themselves"));
            }
            *id
        }
        Principal::Admin { .. } => {
            require_permission(&ctx, &permissions::ORDERS_WRITE)?;
            body.customer_id
                .ok_or_else(|| ApiError::bad_request("customer_id is required"))?
        }
    };

    let draft = body.into_new_order(customer_id)?.into_draft(Utc::now())?;
    let order = services.store.create_order(draft).await?;
    tracing::info!(
        order_id = %order.order.id,
        customer_id = %customer_id,
        items = order.items.len(),
        "order created"
    );

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "order": order }))).into_response())
}

/// PATCH /api/order/:id/status
///
/// Customers may only request `Cancelled` or `Replacement` on their own orders.
pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusUpdateRequest>,
) -> Result<Response, ApiError> {
    let update = body.into_update()?;
    let current = load_order(&services, &ctx, &id).await?;

    match ctx.principal() {
        Principal::Customer { .. } => {
            require_owner_or(&ctx, current.order.customer_id, &permissions::ORDERS_UPDATE_STATUS)?;
            if !update.status.is_customer_requestable() {
                return Err(ApiError::forbidden("customers may only cancel or request a replacement"));
            }
        }
        Principal::Admin { .. } => require_permission(&ctx, &permissions::ORDERS_UPDATE_STATUS)?,
    }

    let status = update.status;
    let order = services
        .store
        .update_order(&current.order.id, &update.into(), Utc::now())
        .await?;
    tracing::info!(order_id = %order.order.id, from = %current.order.status, to = %status, "order status updated");

    Ok((StatusCode::OK, Json(json!({ "success": true, "order": order }))).into_response())
}

/// PUT /api/order/:id (full admin)
pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateOrderRequest>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::ORDERS_WRITE)?;
    let id = OrderId::parse(&id)?;
    let patch = body.into_patch()?;

    let order = services.store.update_order(&id, &patch, Utc::now()).await?;
    tracing::info!(order_id = %order.order.id, "order updated");
    Ok((StatusCode::OK, Json(json!({ "success": true, "order": order }))).into_response())
}

/// DELETE /api/order/:id (full admin)
pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::ORDERS_DELETE)?;
    let id = OrderId::parse(&id)?;

    let order = services.store.delete_order(&id).await?;
    tracing::info!(order_id = %order.order.id, "order deleted");
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Order deleted successfully", "order": order })),
    )
        .into_response())
}

/// A customer asking for someone else's order gets the same 404 as for an
/// unknown id.
async fn load_order(
    services: &AppServices,
    ctx: &PrincipalContext,
    raw_id: &str,
) -> Result<OrderDetails, ApiError> {
    let id = OrderId::parse(raw_id)?;
    services
        .store
        .find_order(&id)
        .await?
        .filter(|o| match ctx.principal() {
            Principal::Customer { id } => *id == o.order.customer_id,
            Principal::Admin { .. } => true,
        })
        .ok_or_else(|| ApiError::not_found("order"))
}
