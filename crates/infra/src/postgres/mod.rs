//! Postgres-backed stores.
//!
//! Multi-statement writes run inside one transaction; dropping the transaction
//! on an early `?` return rolls everything back. Typed patches are merged
//! against the row read with `SELECT ... FOR UPDATE` in the same transaction,
//! except for orders, whose patch maps directly onto `COALESCE($n, column)`.

mod auth;
mod catalog;
mod customers;
mod orders;

use std::sync::Arc;

use sqlx::PgPool;

use crate::store::page;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `(limit, offset)` as Postgres BIGINTs.
pub(crate) fn page_i64(limit: Option<u32>, offset: Option<u32>) -> (i64, i64) {
    let (limit, offset) = page(limit, offset);
    (i64::from(limit), i64::from(offset))
}

/// `%needle%` for ILIKE, with the pattern metacharacters escaped.
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    let needle = search.map(str::trim).filter(|s| !s.is_empty())?;
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some(" 50%_off ")).as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
