//! Infrastructure layer: configuration, Postgres and in-memory stores, the OTP
//! store, the SMS gateway client and the expiry sweeper.

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod otp;
pub mod postgres;
pub mod sms;
pub mod store;
pub mod sweeper;

pub use config::{AppConfig, AppEnv, BootstrapAdmin, DbConfig, SmsConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use otp::{InMemoryOtpStore, OtpStore, PostgresOtpStore};
pub use postgres::PostgresStore;
pub use sms::{sms_sender, LogOnlySms, SmsError, SmsSender, TwoFactorSms};
pub use store::{
    AddressStore, AdminStore, CatalogStore, CustomerStore, OrderStore, PaymentStore, SessionStore, Store,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use sweeper::{spawn_sweeper, sweep_once, SweeperHandle, SWEEP_INTERVAL};
