//! Value objects: equality by value, not identity.
//!
//! These wrap the handful of primitive inputs whose format the shop relies on
//! (mobile numbers as login keys, pincodes for delivery, money amounts), so a
//! value that exists has already been validated.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// `Mobile`s holding the same digits are the same mobile.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Indian mobile number: exactly ten digits, first digit 6-9.
///
/// Common decorations (`+91`, leading `0`, spaces, dashes) are stripped when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mobile(String);

impl Mobile {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();
        let digits = digits
            .strip_prefix("+91")
            .or_else(|| if digits.len() == 11 { digits.strip_prefix('0') } else { None })
            .unwrap_or(&digits);

        let valid = digits.len() == 10
            && digits.chars().all(|c| c.is_ascii_digit())
            && matches!(digits.as_bytes()[0], b'6'..=b'9');
        if !valid {
            return Err(DomainError::validation("mobile must be a valid 10-digit number"));
        }
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Mobile {}

impl FromStr for Mobile {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Mobile {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Mobile> for String {
    fn from(value: Mobile) -> Self {
        value.0
    }
}

impl core::fmt::Display for Mobile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Six-digit postal code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pincode(String);

impl Pincode {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let valid = trimmed.len() == 6
            && trimmed.chars().all(|c| c.is_ascii_digit())
            && !trimmed.starts_with('0');
        if !valid {
            return Err(DomainError::validation("pincode must be a 6-digit number"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Pincode {}

impl TryFrom<String> for Pincode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pincode> for String {
    fn from(value: Pincode) -> Self {
        value.0
    }
}

impl core::fmt::Display for Pincode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-negative money amount in rupees, at most two decimal places and at
/// most [`Amount::MAX`] (the `NUMERIC(12,2)` column range).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);
    pub const MAX: Amount = Amount(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2));

    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation("amount must not be negative"));
        }
        if value.scale() > 2 && value.normalize().scale() > 2 {
            return Err(DomainError::validation("amount must have at most two decimal places"));
        }
        if value > Self::MAX.0 {
            return Err(DomainError::validation(format!("amount must not exceed {}", Self::MAX)));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `self * quantity`; `None` when the product exceeds [`Amount::MAX`].
    pub fn times(&self, quantity: u32) -> Option<Amount> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .filter(|v| *v <= Self::MAX.0)
            .map(Amount)
    }
}

impl ValueObject for Amount {}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::prelude::FromPrimitive;

    #[test]
    fn mobile_strips_country_code_and_separators() {
        assert_eq!(Mobile::parse("+91 98765-43210").unwrap().as_str(), "9876543210");
        assert_eq!(Mobile::parse("09876543210").unwrap().as_str(), "9876543210");
    }

    #[test]
    fn mobile_rejects_short_or_invalid_prefix() {
        assert!(Mobile::parse("98765").is_err());
        assert!(Mobile::parse("1234567890").is_err());
        assert!(Mobile::parse("98765abcde").is_err());
    }

    #[test]
    fn mobile_deserializes_through_validation() {
        let ok: Mobile = serde_json::from_str("\"9876543210\"").unwrap();
        assert_eq!(ok.as_str(), "9876543210");
        assert!(serde_json::from_str::<Mobile>("\"12\"").is_err());
    }

    #[test]
    fn pincode_requires_six_digits() {
        assert!(Pincode::parse("560001").is_ok());
        assert!(Pincode::parse(" 110011 ").is_ok());
        assert!(Pincode::parse("56001").is_err());
        assert!(Pincode::parse("012345").is_err());
    }

    #[test]
    fn amount_rejects_negative_and_sub_paisa() {
        assert!(Amount::new(Decimal::new(-1, 0)).is_err());
        assert!(Amount::new(Decimal::new(12345, 3)).is_err());
        assert_eq!(Amount::new(Decimal::new(12340, 3)).unwrap().value(), Decimal::new(1234, 2));
    }

    #[test]
    fn amount_times_quantity() {
        let unit = Amount::new(Decimal::new(4999, 2)).unwrap();
        assert_eq!(unit.times(3).unwrap().value(), Decimal::new(14997, 2));
    }

    #[test]
    fn amount_is_capped_at_the_column_range() {
        assert_eq!(Amount::MAX.value(), Decimal::new(999_999_999_999, 2));
        assert!(Amount::new(Decimal::new(999_999_999_999, 2)).is_ok());
        assert!(Amount::new(Decimal::new(1_000_000_000_000, 2)).is_err());
        assert!(Amount::new(Decimal::MAX).is_err());

        let err = serde_json::from_str::<Amount>("\"10000000000.00\"").unwrap_err();
        assert!(err.to_string().contains("must not exceed"), "{err}");

        let big = Amount::new(Decimal::new(5_000_000_000, 0)).unwrap();
        assert!(big.times(1).is_some());
        assert!(big.times(2).is_none());
    }

    proptest! {
        #[test]
        fn any_valid_ten_digit_mobile_parses(tail in 0u64..1_000_000_000u64, head in 6u8..=9u8) {
            let raw = format!("{head}{tail:09}");
            let mobile = Mobile::parse(&raw).unwrap();
            prop_assert_eq!(mobile.as_str(), raw.as_str());
        }

        #[test]
        fn whole_rupee_amounts_are_accepted(rupees in 0u32..10_000_000u32) {
            let value = Decimal::from_u32(rupees).unwrap();
            prop_assert!(Amount::new(value).is_ok());
        }
    }
}
