//! Storefront catalog and back-office inventory.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use herbstore_auth::permissions;
use herbstore_catalog::{NewProduct, NewTaxon, ProductFilter, ProductPatch, StockAdjustment};
use herbstore_core::ProductId;

use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::PrincipalContext;

/// Read-only browsing; no session needed.
pub fn public_router() -> Router {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/brands", get(list_brands))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
}

/// Catalog maintenance.
pub fn router() -> Router {
    Router::new()
        .route("/categories", post(create_category))
        .route("/brands", post(create_brand))
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(deactivate_product))
        .route("/products/:id/stock", patch(adjust_stock))
}

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, ApiError> {
    let categories = services.store.list_categories(false).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "categories": categories }))).into_response())
}

pub async fn list_brands(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, ApiError> {
    let brands = services.store.list_brands(false).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "brands": brands }))).into_response())
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(mut filter): ApiQuery<ProductFilter>,
) -> Result<Response, ApiError> {
    filter.include_inactive = false;
    let products = services.store.list_products(&filter).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "products": products }))).into_response())
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: ProductId = id.parse()?;
    let product = services
        .store
        .find_product(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::not_found("product"))?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "product": product }))).into_response())
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<NewTaxon>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::CATALOG_WRITE)?;
    let category = body.into_category()?;
    services.store.insert_category(&category).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "category": category }))).into_response())
}

pub async fn create_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<NewTaxon>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::CATALOG_WRITE)?;
    let brand = body.into_brand()?;
    services.store.insert_brand(&brand).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "brand": brand }))).into_response())
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::CATALOG_WRITE)?;
    let product = body.into_product(Utc::now())?;
    services.store.insert_product(&product).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "product": product }))).into_response())
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::CATALOG_WRITE)?;
    let id: ProductId = id.parse()?;
    let product = services.store.update_product(id, &patch, Utc::now()).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "product": product }))).into_response())
}

/// PATCH /api/products/:id/stock `{delta}`
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(adjustment): ApiJson<StockAdjustment>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::CATALOG_STOCK)?;
    let id: ProductId = id.parse()?;
    let product = services.store.adjust_stock(id, adjustment, Utc::now()).await?;
    tracing::info!(product_id = %id, delta = adjustment.delta, stock = product.stock_quantity, "stock adjusted");
    Ok((StatusCode::OK, Json(json!({ "success": true, "product": product }))).into_response())
}

/// DELETE /api/products/:id hides the product; order history keeps referencing it.
pub async fn deactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_permission(&ctx, &permissions::CATALOG_WRITE)?;
    let id: ProductId = id.parse()?;
    let product = services.store.deactivate_product(id, Utc::now()).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Product deactivated", "product": product })),
    )
        .into_response())
}
