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

use herbstore_auth::permissions;
use herbstore_core::PaymentId;
use herbstore_orders::PaymentStatus;

use crate::app::dto::{PaymentListQuery, PaymentStatusRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiQuery, ValidJson};
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::PrincipalContext;

/// Back office only; mounted behind `require_admin`.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_payments))
        .route("/:id/status", patch(update_payment_status))
}

/// GET /api/payments (newest first)
pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ApiQuery(query): ApiQuery<PaymentListQuery>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::PAYMENTS_READ)?;
    let payments = services.store.list_payments(&query.into_filter()?).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "payments": payments }))).into_response())
}

/// PATCH /api/payments/:id/status
pub async fn update_payment_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<PaymentStatusRequest>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::PAYMENTS_WRITE)?;
    let id: PaymentId = id.parse()?;
    let status: PaymentStatus = body.status.parse()?;

    let payment = services.store.update_payment_status(id, status, Utc::now()).await?;
    tracing::info!(payment_id = %id, order_id = %payment.order_id, status = status.as_str(), "payment status updated");
    Ok((StatusCode::OK, Json(json!({ "success": true, "payment": payment }))).into_response())
}
