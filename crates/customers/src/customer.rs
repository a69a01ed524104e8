use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herbstore_core::{CustomerId, DomainError, DomainResult, Entity, Mobile};

/// Name given to customers created implicitly by their first OTP login.
pub const DEFAULT_CUSTOMER_NAME: &str = "User";

/// Storefront customer, identified for login purposes by their mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: Option<String>,
    pub mobile: Mobile,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// A customer as created on first successful OTP verification.
    pub fn register(mobile: Mobile, now: DateTime<Utc>) -> Self {
        Self {
            id: CustomerId::new(),
            name: DEFAULT_CUSTOMER_NAME.to_string(),
            email: None,
            mobile,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant helper: deactivated customers cannot log in.
    pub fn can_login(&self) -> bool {
        self.is_active
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Partial update of a customer profile; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl CustomerPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name must not be empty"));
            }
            if name.chars().count() > 100 {
                return Err(DomainError::validation("name must be at most 100 characters"));
            }
        }
        if let Some(email) = &self.email {
            if !looks_like_email(email) {
                return Err(DomainError::validation("email must be a valid email address"));
            }
        }
        Ok(())
    }

    pub fn apply_to(&self, customer: &mut Customer, now: DateTime<Utc>) -> DomainResult<()> {
        self.validate()?;
        if let Some(name) = &self.name {
            customer.name = name.trim().to_string();
        }
        if let Some(email) = &self.email {
            customer.email = Some(email.trim().to_ascii_lowercase());
        }
        if let Some(active) = self.is_active {
            customer.is_active = active;
        }
        customer.updated_at = now;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.is_active.is_none()
    }
}

fn looks_like_email(raw: &str) -> bool {
    let raw = raw.trim();
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !raw.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Admin customer listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFilter {
    /// Case-insensitive substring of name, mobile or email.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        customer.name.to_lowercase().contains(&needle)
            || customer.mobile.as_str().contains(&needle)
            || customer
                .email
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(&needle))
    }
}
