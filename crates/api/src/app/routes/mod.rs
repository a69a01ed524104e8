use std::sync::Arc;

use axum::Router;

use crate::app::services::AppServices;
use crate::middleware;

pub mod admins;
pub mod auth;
pub mod catalog;
pub mod customers;
pub mod orders;
pub mod payments;
pub mod system;

/// Everything under `/api`.
pub fn router(services: Arc<AppServices>) -> Router {
    public_router().merge(protected_router(services))
}

/// Login and storefront browsing.
fn public_router() -> Router {
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(catalog::public_router())
}

/// Routes that need a session. Back-office routers add `require_admin` before
/// nesting so that `authenticate` always runs first.
fn protected_router(services: Arc<AppServices>) -> Router {
    let admin_only = |router: Router| router.route_layer(axum::middleware::from_fn(middleware::require_admin));

    Router::new()
        .nest("/auth", auth::router())
        .nest("/order", orders::router())
        .nest("/customer", customers::router())
        .nest("/payments", admin_only(payments::router()))
        .nest("/admin", admin_only(admins::router()))
        .merge(admin_only(catalog::router()))
        .route_layer(axum::middleware::from_fn_with_state(services, middleware::authenticate))
}
