use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// GET /health (outside `/api`; no store round-trip)
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "success": true, "status": "ok" })))
}
