//! Backend wiring shared by every handler.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use herbstore_auth::{AdminRole, NewAdmin};
use herbstore_infra::{
    db, sms_sender, AppConfig, BootstrapAdmin, InMemoryOtpStore, InMemoryStore, LogOnlySms, OtpStore,
    PostgresOtpStore, PostgresStore, SmsSender, Store,
};

#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub otp: Arc<dyn OtpStore>,
    pub sms: Arc<dyn SmsSender>,
    /// Development mode: `send-otp` echoes the code and 500s carry details.
    pub development: bool,
}

impl AppServices {
    /// Everything in process memory; used by tests and when no database is configured.
    pub fn in_memory(development: bool) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            otp: Arc::new(InMemoryOtpStore::new()),
            sms: Arc::new(LogOnlySms::new(development)),
            development,
        }
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let development = config.env.is_development();
        let sms: Arc<dyn SmsSender> =
            Arc::from(sms_sender(&config.sms, development).context("failed to build sms client")?);

        let Some(db_config) = &config.database else {
            tracing::warn!("DATABASE_URL not set; using the in-memory backend (state is lost on restart)");
            return Ok(Self { sms, ..Self::in_memory(development) });
        };

        let pool = db::connect(db_config).await?;
        db::migrate(&pool).await?;

        Ok(Self {
            store: Arc::new(PostgresStore::new(pool.clone())),
            otp: Arc::new(PostgresOtpStore::new(pool)),
            sms,
            development,
        })
    }

    /// Create the configured first admin unless that username already exists.
    pub async fn bootstrap_admin(&self, bootstrap: &BootstrapAdmin) -> anyhow::Result<()> {
        if self
            .store
            .find_admin_by_username(&bootstrap.username)
            .await
            .context("failed to look up bootstrap admin")?
            .is_some()
        {
            tracing::debug!("bootstrap admin already present");
            return Ok(());
        }

        let admin = NewAdmin {
            username: bootstrap.username.clone(),
            password: bootstrap.password.clone(),
            role: AdminRole::Admin,
        }
        .into_admin(Utc::now())
        .context("invalid bootstrap admin credentials")?;
        self.store
            .insert_admin(&admin)
            .await
            .context("failed to create bootstrap admin")?;
        tracing::info!(admin_id = %admin.id, username = %admin.username, "bootstrap admin created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent() {
        let services = AppServices::in_memory(true);
        let bootstrap = BootstrapAdmin { username: "Owner".into(), password: "correct horse".into() };

        services.bootstrap_admin(&bootstrap).await.unwrap();
        services.bootstrap_admin(&bootstrap).await.unwrap();

        let admins = services.store.list_admins().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "owner");
        assert_eq!(admins[0].role, AdminRole::Admin);
    }
}
