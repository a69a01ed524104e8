use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use herbstore_auth::{validate_session, AuthzError, Principal, SessionToken};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Resolve the bearer token with one session lookup and attach the principal.
///
/// Admin and customer tokens are both accepted; route guards narrow further.
pub async fn authenticate(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = extract_bearer(req.headers())?;
    let token = SessionToken::parse(raw)?;

    let session = services
        .store
        .find_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid session token"))?;
    validate_session(&session, Utc::now())?;

    req.extensions_mut()
        .insert(PrincipalContext::new(session.principal, session.token, session.expires_at));

    Ok(next.run(req).await)
}

/// Guard for back-office routers; layered inside `authenticate`.
pub async fn require_admin(req: Request, next: Next) -> Response {
    match principal_of(&req) {
        Some(Principal::Admin { .. }) => next.run(req).await,
        Some(Principal::Customer { .. }) => ApiError::from(AuthzError::AdminRequired).into_response(),
        None => ApiError::unauthorized("authentication required").into_response(),
    }
}

/// Guard for storefront-only routes; layered inside `authenticate`.
pub async fn require_customer(req: Request, next: Next) -> Response {
    match principal_of(&req) {
        Some(Principal::Customer { .. }) => next.run(req).await,
        Some(Principal::Admin { .. }) => ApiError::from(AuthzError::CustomerRequired).into_response(),
        None => ApiError::unauthorized("authentication required").into_response(),
    }
}

fn principal_of(req: &Request) -> Option<&Principal> {
    req.extensions().get::<PrincipalContext>().map(PrincipalContext::principal)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::unauthorized("authentication required");

    let header = headers.get(axum::http::header::AUTHORIZATION).ok_or_else(missing)?;
    let header = header.to_str().map_err(|_| missing())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(missing)?.trim();
    if token.is_empty() {
        return Err(missing());
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_is_required() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_err());

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer(&headers).is_err());

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer(&headers).unwrap(), "abc123");
    }
}
