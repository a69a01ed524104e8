//! `herbstore-auth`: authentication and authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it defines who a
//! caller is (`Principal`), what they may do (`Permission`), and the pure rules
//! for sessions, one-time passwords and admin passwords.

pub mod admin;
pub mod authorize;
pub mod otp;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;

pub use admin::{normalize_username, AdminSummary, AdminUser, NewAdmin};
pub use authorize::{authorize, authorize_customer_access, AuthzError};
pub use otp::{check_otp, OtpCode, OtpEntry, OtpError, OTP_TTL_SECS};
pub use password::{hash_password, verify_password, PasswordError};
pub use permissions::Permission;
pub use principal::{Principal, PrincipalKind};
pub use roles::AdminRole;
pub use session::{
    validate_session, Session, SessionError, SessionMeta, SessionToken,
    ADMIN_SESSION_HOURS, CUSTOMER_SESSION_HOURS,
};
