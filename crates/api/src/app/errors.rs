//! One error type for every handler.
//!
//! Each layer's error converts into `ApiError`, which renders as
//! `{ "success": false, "message": ... }` with the matching status code.

use std::sync::OnceLock;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use herbstore_auth::{AuthzError, OtpError, PasswordError, SessionError};
use herbstore_core::DomainError;
use herbstore_infra::{SmsError, StoreError};

static EXPOSE_INTERNAL: OnceLock<bool> = OnceLock::new();

/// Include the underlying message of 500 responses as `detail`. Set once at
/// startup; only development servers turn it on.
pub fn expose_internal_errors(enabled: bool) {
    let _ = EXPOSE_INTERNAL.set(enabled);
}

fn internal_exposed() -> bool {
    EXPOSE_INTERNAL.get().copied().unwrap_or(false)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                let mut body = json!({ "success": false, "message": "internal server error" });
                if internal_exposed() {
                    body["detail"] = json!(detail);
                }
                (status, axum::Json(body)).into_response()
            }
            ApiError::BadGateway(detail) => {
                tracing::warn!(error = %detail, "upstream call failed");
                json_error(status, "failed to send OTP")
            }
            other => json_error(status, other.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(_) | DomainError::InvalidId(_) => Self::BadRequest(err.to_string()),
            DomainError::NotFound(_) => Self::NotFound(err.to_string()),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) | StoreError::ForeignKey(_) => Self::NotFound(err.to_string()),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Domain(inner) => inner.into(),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self::Forbidden(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => Self::BadRequest(err.to_string()),
            PasswordError::Hash(msg) => Self::Internal(msg),
        }
    }
}

impl From<SmsError> for ApiError {
    fn from(err: SmsError) -> Self {
        Self::BadGateway(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::BadRequest(first_validation_message(&errors, ""))
    }
}

/// First failing field as `"<path>: <message>"`, walking nested structs and lists.
fn first_validation_message(errors: &ValidationErrors, prefix: &str) -> String {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(e) = errs.first() {
                    let msg = e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string());
                    return format!("{path}: {msg}");
                }
            }
            ValidationErrorsKind::Struct(inner) => return first_validation_message(inner, &path),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_validation_message(inner, &format!("{path}[{idx}]"));
                }
            }
        }
    }
    "invalid request".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1, message = "must not be empty"))]
        name: String,
    }

    #[test]
    fn store_errors_map_to_status_codes() {
        assert_eq!(ApiError::from(StoreError::not_found("order")).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::ForeignKey("order_item_product_id_fkey".into())).to_string(),
            "referenced record not found"
        );
        assert_eq!(ApiError::from(StoreError::Conflict("dup".into())).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(StoreError::Domain(DomainError::validation("bad"))).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(StoreError::backend("boom")).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn auth_errors_map_to_status_codes() {
        assert_eq!(ApiError::from(SessionError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthzError::NotOwner).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(OtpError::Mismatch).to_string(), "Invalid OTP");
    }

    #[tokio::test]
    async fn sms_failures_return_a_fixed_message() {
        let err = ApiError::from(SmsError::Rejected { status: 401 });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "failed to send OTP");
        assert_eq!(body["success"], false);
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = Named { name: String::new() }.validate().unwrap_err();
        assert_eq!(ApiError::from(err).to_string(), "name: must not be empty");
    }
}
