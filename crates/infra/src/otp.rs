//! Pending one-time passwords, keyed by mobile number.
//!
//! At most one code is pending per mobile: `put` overwrites. `consume`
//! checks and removes in one step, so a code logs in at most once.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use herbstore_auth::{check_otp, OtpCode, OtpEntry, OtpError};
use herbstore_core::Mobile;

use crate::error::{map_sqlx_error, StoreError, StoreResult};

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn put(&self, mobile: &Mobile, entry: OtpEntry) -> StoreResult<()>;

    async fn get(&self, mobile: &Mobile) -> StoreResult<Option<OtpEntry>>;

    async fn remove(&self, mobile: &Mobile) -> StoreResult<()>;

    /// Check `submitted` against the pending code and remove the entry on a
    /// match or on expiry. A mismatch leaves the entry in place. Concurrent
    /// calls with the same code see exactly one `Ok`.
    async fn consume(
        &self,
        mobile: &Mobile,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Result<(), OtpError>>;

    /// Drop every entry whose expiry has passed; returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryOtpStore {
    entries: Arc<RwLock<HashMap<String, OtpEntry>>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::backend("otp store lock poisoned")
}

/// Outcome of a verification attempt and whether the entry must go.
fn settle(entry: Option<&OtpEntry>, submitted: &str, now: DateTime<Utc>) -> (Result<(), OtpError>, bool) {
    let outcome = check_otp(entry, submitted, now);
    let spent = matches!(outcome, Ok(()) | Err(OtpError::Expired));
    (outcome, spent)
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, mobile: &Mobile, entry: OtpEntry) -> StoreResult<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(mobile.as_str().to_string(), entry);
        Ok(())
    }

    async fn get(&self, mobile: &Mobile) -> StoreResult<Option<OtpEntry>> {
        Ok(self.entries.read().map_err(poisoned)?.get(mobile.as_str()).cloned())
    }

    async fn remove(&self, mobile: &Mobile) -> StoreResult<()> {
        self.entries.write().map_err(poisoned)?.remove(mobile.as_str());
        Ok(())
    }

    async fn consume(
        &self,
        mobile: &Mobile,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Result<(), OtpError>> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let (outcome, spent) = settle(entries.get(mobile.as_str()), submitted, now);
        if spent {
            entries.remove(mobile.as_str());
        }
        Ok(outcome)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

/// Codes in the `otp_code` table, so they survive restarts and are shared
/// between instances.
#[derive(Debug, Clone)]
pub struct PostgresOtpStore {
    pool: Arc<PgPool>,
}

impl PostgresOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[derive(Debug, FromRow)]
struct OtpRow {
    code: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl OtpStore for PostgresOtpStore {
    #[instrument(skip_all, err)]
    async fn put(&self, mobile: &Mobile, entry: OtpEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_code (mobile, code, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (mobile) DO UPDATE SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(mobile.as_str())
        .bind(entry.code.as_str())
        .bind(entry.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("put_otp", e))?;
        Ok(())
    }

    async fn get(&self, mobile: &Mobile) -> StoreResult<Option<OtpEntry>> {
        let row = sqlx::query_as::<_, OtpRow>("SELECT code, expires_at FROM otp_code WHERE mobile = $1")
            .bind(mobile.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_otp", e))?;
        Ok(row.map(|r| OtpEntry { code: OtpCode::from_string(r.code), expires_at: r.expires_at }))
    }

    async fn remove(&self, mobile: &Mobile) -> StoreResult<()> {
        sqlx::query("DELETE FROM otp_code WHERE mobile = $1")
            .bind(mobile.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_otp", e))?;
        Ok(())
    }

    /// The row is locked with `FOR UPDATE` so a second verifier waits for the
    /// first to commit and then finds nothing.
    #[instrument(skip_all, err)]
    async fn consume(
        &self,
        mobile: &Mobile,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Result<(), OtpError>> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query_as::<_, OtpRow>(
            "SELECT code, expires_at FROM otp_code WHERE mobile = $1 FOR UPDATE",
        )
        .bind(mobile.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_otp", e))?;
        let entry = row.map(|r| OtpEntry { code: OtpCode::from_string(r.code), expires_at: r.expires_at });

        let (outcome, spent) = settle(entry.as_ref(), submitted, now);
        if spent {
            sqlx::query("DELETE FROM otp_code WHERE mobile = $1")
                .bind(mobile.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("consume_otp", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(outcome)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM otp_code WHERE expires_at < $1")
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("purge_expired_otps", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mobile(s: &str) -> Mobile {
        Mobile::parse(s).unwrap()
    }

    #[tokio::test]
    async fn put_overwrites_previous_code() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let m = mobile("9876543210");

        let first = OtpEntry::issue(now);
        let second = OtpEntry { code: OtpCode::from_string("111111"), expires_at: first.expires_at };
        store.put(&m, first).await.unwrap();
        store.put(&m, second.clone()).await.unwrap();

        assert_eq!(store.get(&m).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn remove_and_purge() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let fresh = mobile("9876543210");
        let stale = mobile("9123456780");

        store.put(&fresh, OtpEntry::issue(now)).await.unwrap();
        store
            .put(&stale, OtpEntry { code: OtpCode::from_string("222222"), expires_at: now - Duration::seconds(1) })
            .await
            .unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.get(&stale).await.unwrap().is_none());
        assert!(store.get(&fresh).await.unwrap().is_some());

        store.remove(&fresh).await.unwrap();
        assert!(store.get(&fresh).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consume_spends_a_code_once() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let m = mobile("9876543210");
        store
            .put(&m, OtpEntry { code: OtpCode::from_string("424242"), expires_at: now + Duration::seconds(60) })
            .await
            .unwrap();

        assert_eq!(store.consume(&m, "000000", now).await.unwrap(), Err(OtpError::Mismatch));
        assert!(store.get(&m).await.unwrap().is_some());

        assert_eq!(store.consume(&m, "424242", now).await.unwrap(), Ok(()));
        assert_eq!(store.consume(&m, "424242", now).await.unwrap(), Err(OtpError::NotFound));
    }

    #[tokio::test]
    async fn consume_removes_expired_codes() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let m = mobile("9876543210");
        store
            .put(&m, OtpEntry { code: OtpCode::from_string("424242"), expires_at: now - Duration::seconds(1) })
            .await
            .unwrap();

        assert_eq!(store.consume(&m, "424242", now).await.unwrap(), Err(OtpError::Expired));
        assert!(store.get(&m).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_get_one_success() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        let m = mobile("9876543210");
        store
            .put(&m, OtpEntry { code: OtpCode::from_string("424242"), expires_at: now + Duration::seconds(60) })
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let m = m.clone();
                tokio::spawn(async move { store.consume(&m, "424242", now).await.unwrap() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
