use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use herbstore_auth::{permissions, NewAdmin};

use crate::app::dto::CreateAdminRequest;
use crate::app::errors::ApiError;
use crate::app::extract::ValidJson;
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::PrincipalContext;

/// Back-office account management; mounted behind `require_admin`.
pub fn router() -> Router {
    Router::new().route("/users", get(list_admins).post(create_admin))
}

/// GET /api/admin/users
pub async fn list_admins(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::ADMINS_MANAGE)?;
    // `AdminUser` never serializes its password hash.
    let admins = services.store.list_admins().await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "admins": admins }))).into_response())
}

/// POST /api/admin/users
pub async fn create_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<CreateAdminRequest>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::ADMINS_MANAGE)?;
    let admin = NewAdmin::from(body).into_admin(Utc::now())?;
    services.store.insert_admin(&admin).await?;
    tracing::info!(
        admin_id = %admin.id,
        username = %admin.username,
        role = admin.role.as_str(),
        created_by = ?ctx.admin_id(),
        "admin created"
    );
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "admin": admin }))).into_response())
}
