//! Login and session routes.
//!
//! Customers log in with a one-time code sent to their mobile; admins with a
//! username and password. Both receive an opaque bearer token.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use herbstore_auth::{verify_password, OtpEntry, Principal, Session, SessionMeta};
use herbstore_core::Mobile;
use herbstore_customers::Customer;
use herbstore_infra::StoreError;

use crate::app::dto::{AdminLoginRequest, SendOtpRequest, VerifyOtpRequest};
use crate::app::errors::ApiError;
use crate::app::extract::ValidJson;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

const MAX_USER_AGENT_LEN: usize = 512;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Routes reachable without a session.
pub fn public_router() -> Router {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/admin/login", post(admin_login))
}

/// Routes that act on the caller's session.
pub fn router() -> Router {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/auth/send-otp
pub async fn send_otp(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<SendOtpRequest>,
) -> Result<Response, ApiError> {
    let mobile = Mobile::parse(&body.mobile)?;
    let entry = OtpEntry::issue(Utc::now());
    let code = entry.code.clone();

    services.otp.put(&mobile, entry).await?;
    if let Err(err) = services.sms.send_otp(&mobile, &code).await {
        services.otp.remove(&mobile).await?;
        return Err(err.into());
    }

    let mut body = json!({ "success": true, "message": "OTP sent successfully" });
    if services.development {
        body["otp"] = json!(code.as_str());
    }
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// POST /api/auth/verify-otp
pub async fn verify_otp(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    ValidJson(body): ValidJson<VerifyOtpRequest>,
) -> Result<Response, ApiError> {
    let mobile = Mobile::parse(&body.mobile)?;
    let now = Utc::now();

    services.otp.consume(&mobile, &body.otp, now).await??;

    let (customer, is_new_user) = find_or_register(&services, mobile, now).await?;
    if !customer.can_login() {
        return Err(ApiError::forbidden("account is deactivated"));
    }
    let customer = services.store.record_customer_login(customer.id, now).await?;

    let session = Session::issue(Principal::Customer { id: customer.id }, now, session_meta(&headers));
    services.store.replace_sessions(&session).await?;
    tracing::info!(customer_id = %customer.id, is_new_user, "customer logged in");

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Login successful",
            "user": customer,
            "token": session.token.as_str(),
            "expiresAt": session.expires_at,
            "isNewUser": is_new_user,
        })),
    )
        .into_response())
}

/// POST /api/auth/admin/login
pub async fn admin_login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    ValidJson(body): ValidJson<AdminLoginRequest>,
) -> Result<Response, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid username or password");

    let admin = services
        .store
        .find_admin_by_username(&body.username)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&body.password, &admin.password_hash) {
        tracing::info!(admin_id = %admin.id, "admin login rejected");
        return Err(invalid());
    }
    if !admin.is_active {
        return Err(ApiError::forbidden("account is deactivated"));
    }

    let now = Utc::now();
    let session = Session::issue(
        Principal::Admin { id: admin.id, role: admin.role },
        now,
        session_meta(&headers),
    );
    services.store.replace_sessions(&session).await?;
    services.store.record_admin_login(admin.id, now).await?;
    tracing::info!(admin_id = %admin.id, role = admin.role.as_str(), "admin logged in");

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "admin": admin.summary(),
            "token": session.token.as_str(),
            "expiresAt": session.expires_at,
        })),
    )
        .into_response())
}

/// POST /api/auth/logout
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    services.store.delete_session(ctx.token()).await?;
    Ok((StatusCode::OK, Json(json!({ "success": true, "message": "Logged out" }))).into_response())
}

/// GET /api/auth/me
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    let body = match ctx.principal() {
        Principal::Customer { id } => {
            let customer = services
                .store
                .find_customer(*id)
                .await?
                .ok_or_else(|| ApiError::not_found("customer"))?;
            json!({ "success": true, "type": "customer", "user": customer, "expiresAt": ctx.expires_at() })
        }
        Principal::Admin { id, .. } => {
            let admin = services
                .store
                .find_admin(*id)
                .await?
                .ok_or_else(|| ApiError::not_found("admin"))?;
            json!({ "success": true, "type": "admin", "admin": admin.summary(), "expiresAt": ctx.expires_at() })
        }
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn find_or_register(
    services: &AppServices,
    mobile: Mobile,
    now: chrono::DateTime<Utc>,
) -> Result<(Customer, bool), ApiError> {
    if let Some(existing) = services.store.find_customer_by_mobile(&mobile).await? {
        return Ok((existing, false));
    }

    let customer = Customer::register(mobile.clone(), now);
    match services.store.insert_customer(&customer).await {
        Ok(()) => {
            tracing::info!(customer_id = %customer.id, "customer registered");
            Ok((customer, true))
        }
        // Lost a race with a concurrent first login for the same number.
        Err(StoreError::Conflict(_)) => services
            .store
            .find_customer_by_mobile(&mobile)
            .await?
            .map(|c| (c, false))
            .ok_or_else(|| ApiError::Internal("customer vanished after mobile conflict".into())),
        Err(err) => Err(err.into()),
    }
}

fn session_meta(headers: &HeaderMap) -> SessionMeta {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let ip_address = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str("x-real-ip"))
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect());

    SessionMeta { ip_address, user_agent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_meta_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("storefront/1.0"));

        let meta = session_meta(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("storefront/1.0"));
    }

    #[test]
    fn session_meta_is_empty_without_headers() {
        assert_eq!(session_meta(&HeaderMap::new()), SessionMeta::default());
    }
}
