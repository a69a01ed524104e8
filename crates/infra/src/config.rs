//! Process configuration, read once at start-up from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, anyhow};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TWO_FACTOR_BASE_URL: &str = "https://2factor.in/API/V1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn is_development(&self) -> bool {
        matches!(self, AppEnv::Development)
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(anyhow!("APP_ENV must be 'development' or 'production', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub env: AppEnv,
    /// `None` selects the in-memory backend.
    pub database: Option<DbConfig>,
    pub sms: SmsConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:8080")?;

        let env = match get("APP_ENV").or_else(|| get("NODE_ENV")) {
            Some(raw) => AppEnv::parse(&raw)?,
            None => AppEnv::Production,
        };

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DbConfig {
                url,
                max_connections: parse_num(&get, "DB_MAX_CONNECTIONS", 10)?,
                connect_timeout: Duration::from_secs(parse_num(&get, "DB_CONNECT_TIMEOUT_SECS", 5)?),
                idle_timeout: Duration::from_secs(parse_num(&get, "DB_IDLE_TIMEOUT_SECS", 30)?),
            }),
            None => None,
        };

        let sms = SmsConfig {
            api_key: get("TWO_FACTOR_API_KEY"),
            base_url: get("TWO_FACTOR_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TWO_FACTOR_BASE_URL.to_string()),
        };

        let bootstrap_admin = match (get("ADMIN_BOOTSTRAP_USERNAME"), get("ADMIN_BOOTSTRAP_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "ADMIN_BOOTSTRAP_USERNAME and ADMIN_BOOTSTRAP_PASSWORD must be set together"
                ));
            }
        };

        Ok(Self { bind_addr, env, database, sms, bootstrap_admin })
    }
}

fn parse_num<G, T>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_select_in_memory_production() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.env, AppEnv::Production);
        assert!(cfg.database.is_none());
        assert!(cfg.sms.api_key.is_none());
        assert_eq!(cfg.sms.base_url, DEFAULT_TWO_FACTOR_BASE_URL);
        assert!(cfg.bootstrap_admin.is_none());
    }

    #[test]
    fn node_env_is_a_fallback_for_app_env() {
        assert!(config(&[("NODE_ENV", "development")]).unwrap().env.is_development());
        let both = config(&[("APP_ENV", "production"), ("NODE_ENV", "development")]).unwrap();
        assert_eq!(both.env, AppEnv::Production);
        assert!(config(&[("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn database_pool_settings() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/herbstore"),
            ("DB_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        let db = cfg.database.unwrap();
        assert_eq!(db.max_connections, 4);
        assert_eq!(db.connect_timeout, Duration::from_secs(5));
        assert_eq!(db.idle_timeout, Duration::from_secs(30));

        assert!(config(&[("DATABASE_URL", "postgres://x"), ("DB_MAX_CONNECTIONS", "ten")]).is_err());
    }

    #[test]
    fn bootstrap_admin_needs_both_values() {
        assert!(config(&[("ADMIN_BOOTSTRAP_USERNAME", "owner")]).is_err());
        let cfg = config(&[
            ("ADMIN_BOOTSTRAP_USERNAME", "owner"),
            ("ADMIN_BOOTSTRAP_PASSWORD", "change-me-now"),
        ])
        .unwrap();
        let admin = cfg.bootstrap_admin.unwrap();
        assert_eq!(admin.username, "owner");
        assert!(!format!("{admin:?}").contains("change-me-now"));
    }
}
