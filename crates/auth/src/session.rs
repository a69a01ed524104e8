use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Principal, PrincipalKind};

/// Lifetime of a customer session (OTP login).
pub const CUSTOMER_SESSION_HOURS: i64 = 36;

/// Lifetime of an admin session (password login).
pub const ADMIN_SESSION_HOURS: i64 = 24;

const TOKEN_BYTES: usize = 32;

/// Opaque bearer token: 32 random bytes, hex encoded.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accept only well-formed tokens so junk never reaches the store.
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let raw = raw.trim();
        if raw.len() != TOKEN_BYTES * 2 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SessionError::Malformed);
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SessionToken({}…)", &self.0[..8.min(self.0.len())])
    }
}

/// Request metadata recorded with a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Server-side session row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub meta: SessionMeta,
}

impl Session {
    /// Issue a fresh session; the lifetime depends on the principal kind.
    pub fn issue(principal: Principal, now: DateTime<Utc>, meta: SessionMeta) -> Self {
        let hours = match principal.kind() {
            PrincipalKind::Customer => CUSTOMER_SESSION_HOURS,
            PrincipalKind::Admin => ADMIN_SESSION_HOURS,
        };
        Self {
            token: SessionToken::generate(),
            principal,
            created_at: now,
            expires_at: now + Duration::hours(hours),
            meta,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,

    #[error("session has expired")]
    Expired,
}

/// Deterministically validate a looked-up session against the clock.
pub fn validate_session(session: &Session, now: DateTime<Utc>) -> Result<(), SessionError> {
    if session.is_expired(now) {
        return Err(SessionError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use herbstore_core::{AdminId, CustomerId};

    use crate::AdminRole;

    #[test]
    fn generated_tokens_are_64_hex_chars_and_unique() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(SessionToken::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        assert_eq!(SessionToken::parse("abc"), Err(SessionError::Malformed));
        assert_eq!(SessionToken::parse(&"z".repeat(64)), Err(SessionError::Malformed));
    }

    #[test]
    fn debug_does_not_leak_the_token() {
        let t = SessionToken::generate();
        assert!(!format!("{t:?}").contains(t.as_str()));
    }

    #[test]
    fn customer_sessions_last_36_hours_admin_24() {
        let now = Utc::now();
        let c = Session::issue(Principal::Customer { id: CustomerId::new() }, now, SessionMeta::default());
        assert_eq!(c.expires_at - now, Duration::hours(36));

        let a = Session::issue(
            Principal::Admin { id: AdminId::new(), role: AdminRole::Admin },
            now,
            SessionMeta::default(),
        );
        assert_eq!(a.expires_at - now, Duration::hours(24));
    }

    #[test]
    fn expired_session_is_rejected_at_the_boundary() {
        let now = Utc::now();
        let s = Session::issue(Principal::Customer { id: CustomerId::new() }, now, SessionMeta::default());
        assert!(validate_session(&s, now).is_ok());
        assert_eq!(validate_session(&s, s.expires_at), Err(SessionError::Expired));
        assert_eq!(
            validate_session(&s, s.expires_at + Duration::seconds(1)),
            Err(SessionError::Expired)
        );
    }
}
