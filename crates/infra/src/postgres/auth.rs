use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

use herbstore_auth::{AdminRole, AdminUser, Principal, PrincipalKind, Session, SessionMeta, SessionToken};
use herbstore_core::{AdminId, CustomerId};

use super::PostgresStore;
use crate::error::{decode, map_sqlx_error, StoreError, StoreResult};
use crate::store::{AdminStore, SessionStore};

#[derive(Debug, FromRow)]
struct SessionRow {
    token: String,
    principal_type: String,
    principal_id: Uuid,
    role: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let kind = decode("session.principal_type", row.principal_type.parse::<PrincipalKind>())?;
        let principal = match kind {
            PrincipalKind::Customer => Principal::Customer { id: CustomerId::from_uuid(row.principal_id) },
            PrincipalKind::Admin => {
                let role = row
                    .role
                    .as_deref()
                    .ok_or_else(|| StoreError::backend("admin session without role"))?;
                Principal::Admin {
                    id: AdminId::from_uuid(row.principal_id),
                    role: decode("session.role", role.parse::<AdminRole>())?,
                }
            }
        };
        Ok(Session {
            token: decode("session.token", SessionToken::parse(&row.token))?,
            principal,
            created_at: row.created_at,
            expires_at: row.expires_at,
            meta: SessionMeta { ip_address: row.ip_address, user_agent: row.user_agent },
        })
    }
}

#[derive(Debug, FromRow)]
struct AdminRow {
    id: Uuid,
    username: String,
    password_hash: String,
    role: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdminRow> for AdminUser {
    type Error = StoreError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        Ok(AdminUser {
            id: AdminId::from_uuid(row.id),
            username: row.username,
            password_hash: row.password_hash,
            role: decode("admin_user.role", row.role.parse::<AdminRole>())?,
            is_active: row.is_active,
            last_login: row.last_login,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    #[instrument(skip(self, session), fields(principal_type = session.principal.kind().as_str()), err)]
    async fn replace_sessions(&self, session: &Session) -> StoreResult<()> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let kind = session.principal.kind();

        let removed = sqlx::query("DELETE FROM session WHERE principal_type = $1 AND principal_id = $2")
            .bind(kind.as_str())
            .bind(session.principal.subject())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_sessions", e))?
            .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO session (token, principal_type, principal_id, role, ip_address, user_agent,
                                 created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.token.as_str())
        .bind(kind.as_str())
        .bind(session.principal.subject())
        .bind(session.principal.role().map(|r| r.as_str()))
        .bind(&session.meta.ip_address)
        .bind(&session.meta.user_agent)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_sessions", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        tracing::debug!(replaced = removed, "session issued");
        Ok(())
    }

    async fn find_session(&self, token: &SessionToken) -> StoreResult<Option<Session>> {
        sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT token, principal_type, principal_id, role, ip_address, user_agent, created_at, expires_at
            FROM session
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_session", e))?
        .map(Session::try_from)
        .transpose()
    }

    async fn delete_session(&self, token: &SessionToken) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM session WHERE token = $1")
            .bind(token.as_str())
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("delete_session", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM session WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("purge_expired_sessions", e))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AdminStore for PostgresStore {
    async fn find_admin(&self, id: AdminId) -> StoreResult<Option<AdminUser>> {
        sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT id, username, password_hash, role, is_active, last_login, created_at
            FROM admin_user
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_admin", e))?
        .map(AdminUser::try_from)
        .transpose()
    }

    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<AdminUser>> {
        sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT id, username, password_hash, role, is_active, last_login, created_at
            FROM admin_user
            WHERE username = $1
            "#,
        )
        .bind(username.trim().to_ascii_lowercase())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_admin_by_username", e))?
        .map(AdminUser::try_from)
        .transpose()
    }

    #[instrument(skip(self, admin), fields(admin_id = %admin.id, role = admin.role.as_str()), err)]
    async fn insert_admin(&self, admin: &AdminUser) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_user (id, username, password_hash, role, is_active, last_login, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(admin.id.as_uuid())
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(admin.role.as_str())
        .bind(admin.is_active)
        .bind(admin.last_login)
        .bind(admin.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| map_sqlx_error("insert_admin", e))?;
        Ok(())
    }

    async fn list_admins(&self) -> StoreResult<Vec<AdminUser>> {
        let rows = sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT id, username, password_hash, role, is_active, last_login, created_at
            FROM admin_user
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list_admins", e))?;
        rows.into_iter().map(AdminUser::try_from).collect()
    }

    async fn record_admin_login(&self, id: AdminId, now: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE admin_user SET last_login = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("record_admin_login", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("admin"));
        }
        Ok(())
    }
}
