//! One-time passwords for customer login.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long an issued code stays valid.
pub const OTP_TTL_SECS: i64 = 5 * 60;

/// Six-digit numeric code.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn generate() -> Self {
        let n: u32 = rand::thread_rng().gen_range(100_000..=999_999);
        Self(n.to_string())
    }

    pub fn from_string(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// A pending code for one mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpEntry {
    pub code: OtpCode,
    pub expires_at: DateTime<Utc>,
}

impl OtpEntry {
    pub fn issue(now: DateTime<Utc>) -> Self {
        Self {
            code: OtpCode::generate(),
            expires_at: now + Duration::seconds(OTP_TTL_SECS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP not found or expired")]
    NotFound,

    #[error("OTP has expired")]
    Expired,

    #[error("Invalid OTP")]
    Mismatch,
}

/// Check a submitted code against the pending entry.
///
/// The caller removes the entry on `Ok` (codes are single-use) and on `Expired`.
pub fn check_otp(
    entry: Option<&OtpEntry>,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpError> {
    let entry = entry.ok_or(OtpError::NotFound)?;
    if entry.is_expired(now) {
        return Err(OtpError::Expired);
    }
    if !constant_time_eq(entry.code.as_str().as_bytes(), submitted.trim().as_bytes()) {
        return Err(OtpError::Mismatch);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_have_six_digits() {
        for _ in 0..100 {
            let code = OtpCode::generate();
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn entry_expires_after_five_minutes() {
        let now = Utc::now();
        let entry = OtpEntry::issue(now);
        assert!(!entry.is_expired(now + Duration::seconds(299)));
        assert!(entry.is_expired(now + Duration::seconds(301)));
    }

    #[test]
    fn check_reports_missing_expired_and_mismatch() {
        let now = Utc::now();
        let entry = OtpEntry {
            code: OtpCode::from_string("123456"),
            expires_at: now + Duration::seconds(60),
        };

        assert_eq!(check_otp(None, "123456", now), Err(OtpError::NotFound));
        assert_eq!(check_otp(Some(&entry), "654321", now), Err(OtpError::Mismatch));
        assert_eq!(check_otp(Some(&entry), "12345", now), Err(OtpError::Mismatch));
        assert_eq!(
            check_otp(Some(&entry), "123456", now + Duration::seconds(61)),
            Err(OtpError::Expired)
        );
        assert_eq!(check_otp(Some(&entry), " 123456 ", now), Ok(()));
    }

    #[test]
    fn messages_match_api_contract() {
        assert_eq!(OtpError::NotFound.to_string(), "OTP not found or expired");
        assert_eq!(OtpError::Expired.to_string(), "OTP has expired");
        assert_eq!(OtpError::Mismatch.to_string(), "Invalid OTP");
    }
}
