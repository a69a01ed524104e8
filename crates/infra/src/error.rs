//! Store errors and the mapping from SQLx/Postgres failures.
//!
//! | SQLx error | Postgres code | `StoreError` |
//! |------------|---------------|--------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `ForeignKey` |
//! | Database (check violation) | `23514` | `Domain(Validation)` |
//! | Database (numeric out of range) | `22003` | `Domain(Validation)` |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | any | `Backend` |

use herbstore_core::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("referenced record not found")]
    ForeignKey(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(conflict_message(db_err.constraint())),
                Some("23503") => StoreError::ForeignKey(msg),
                Some("23514") => StoreError::Domain(DomainError::validation(format!(
                    "value violates constraint {}",
                    db_err.constraint().unwrap_or("check")
                ))),
                Some("22003") => StoreError::Domain(DomainError::validation("numeric value out of range")),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(operation.to_string()),
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("payment_transaction_id_key") => "transaction id already recorded".to_string(),
        Some("customer_mobile_key") => "a customer with this mobile already exists".to_string(),
        Some("admin_user_username_key") => "username already taken".to_string(),
        Some("category_slug_key") | Some("brand_slug_key") | Some("product_slug_key") => {
            "slug already in use".to_string()
        }
        Some(other) => format!("duplicate value violates {other}"),
        None => "duplicate value".to_string(),
    }
}

/// Decode a database column into a domain value, reporting bad rows as backend errors.
pub(crate) fn decode<T, E: core::fmt::Display>(column: &str, value: Result<T, E>) -> StoreResult<T> {
    value.map_err(|e| StoreError::Backend(format!("invalid value in column {column}: {e}")))
}
