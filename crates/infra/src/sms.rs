//! Outbound SMS for login codes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use herbstore_auth::OtpCode;
use herbstore_core::Mobile;

use crate::config::SmsConfig;

#[derive(Debug, Error)]
pub enum SmsError {
    /// The request URL carries the gateway key and the code, so it is
    /// dropped before the error is stored.
    #[error("sms gateway request failed: {0}")]
    Transport(reqwest::Error),

    #[error("sms gateway rejected the message: {status}")]
    Rejected { status: u16 },
}

impl From<reqwest::Error> for SmsError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url())
    }
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_otp(&self, mobile: &Mobile, code: &OtpCode) -> Result<(), SmsError>;
}

/// 2Factor.in: `GET {base}/{api_key}/SMS/{mobile}/{code}`.
#[derive(Debug, Clone)]
pub struct TwoFactorSms {
    api_key: String,
    base_url: String,
    client: Client,
}

impl TwoFactorSms {
    pub fn new(api_key: String, base_url: String) -> Result<Self, SmsError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn url(&self, mobile: &Mobile, code: &OtpCode) -> String {
        format!("{}/{}/SMS/{}/{}", self.base_url, self.api_key, mobile.as_str(), code.as_str())
    }
}

#[async_trait]
impl SmsSender for TwoFactorSms {
    async fn send_otp(&self, mobile: &Mobile, code: &OtpCode) -> Result<(), SmsError> {
        let response = self.client.get(self.url(mobile, code)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SmsError::Rejected { status: status.as_u16() });
        }
        tracing::info!("otp sms dispatched");
        Ok(())
    }
}

/// Used when no gateway key is configured. Prints the code only when
/// `reveal_codes` is set (development mode).
#[derive(Debug, Clone, Copy)]
pub struct LogOnlySms {
    reveal_codes: bool,
}

impl LogOnlySms {
    pub fn new(reveal_codes: bool) -> Self {
        Self { reveal_codes }
    }
}

#[async_trait]
impl SmsSender for LogOnlySms {
    async fn send_otp(&self, mobile: &Mobile, code: &OtpCode) -> Result<(), SmsError> {
        if self.reveal_codes {
            tracing::info!(mobile = mobile.as_str(), otp = code.as_str(), "sms gateway not configured");
        } else {
            tracing::warn!("sms gateway not configured; otp not delivered");
        }
        Ok(())
    }
}

/// Pick the gateway client, or the logging fallback when no key is set.
pub fn sms_sender(config: &SmsConfig, development: bool) -> Result<Box<dyn SmsSender>, SmsError> {
    match &config.api_key {
        Some(key) => Ok(Box::new(TwoFactorSms::new(key.clone(), config.base_url.clone())?)),
        None => Ok(Box::new(LogOnlySms::new(development))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_factor_url_layout() {
        let sms = TwoFactorSms::new("KEY".into(), "https://2factor.in/API/V1/".into()).unwrap();
        let mobile = Mobile::parse("9876543210").unwrap();
        let code = OtpCode::from_string("123456");
        assert_eq!(sms.url(&mobile, &code), "https://2factor.in/API/V1/KEY/SMS/9876543210/123456");
    }

    #[tokio::test]
    async fn transport_errors_do_not_carry_the_key_or_code() {
        let sms = TwoFactorSms::new("SECRET-API-KEY".into(), "http://127.0.0.1:1".into()).unwrap();
        let mobile = Mobile::parse("9876543210").unwrap();
        let err = sms.send_otp(&mobile, &OtpCode::from_string("481516")).await.unwrap_err();

        assert!(matches!(err, SmsError::Transport(_)));
        for text in [err.to_string(), format!("{err:?}")] {
            assert!(!text.contains("SECRET-API-KEY"), "{text}");
            assert!(!text.contains("481516"), "{text}");
            assert!(!text.contains("9876543210"), "{text}");
        }
    }

    #[tokio::test]
    async fn log_only_sender_always_succeeds() {
        let sms = LogOnlySms::new(false);
        let mobile = Mobile::parse("9876543210").unwrap();
        assert!(sms.send_otp(&mobile, &OtpCode::from_string("123456")).await.is_ok());
    }
}
