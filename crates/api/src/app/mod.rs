//! HTTP application wiring (axum router + shared services).
//!
//! - `services.rs`: store, OTP store and SMS sender selection
//! - `routes/`: one file per resource
//! - `dto.rs`: request bodies and their mapping to domain inputs
//! - `extract.rs`: extractors whose rejections use the error envelope
//! - `errors.rs`: consistent `{success: false, message}` responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

use errors::ApiError;
use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: AppServices) -> Router {
    let services = Arc::new(services);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router(services.clone()))
        .fallback(unknown_route)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

async fn unknown_route() -> ApiError {
    ApiError::not_found("route")
}
