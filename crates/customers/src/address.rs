use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herbstore_core::{AddressId, CustomerId, DomainError, DomainResult, Entity, Pincode};

pub const DEFAULT_COUNTRY: &str = "India";

/// A saved delivery address.
///
/// # Invariants
/// - At most one address per customer has `is_default = true`.
/// - `customer_id` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: Pincode,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Address {
    type Id = AddressId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for creating an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl NewAddress {
    /// Validate and build the address row.
    ///
    /// `has_existing` is whether the customer already has addresses; a first
    /// address always becomes the default.
    pub fn into_address(
        self,
        customer_id: CustomerId,
        has_existing: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Address> {
        let address_line1 = required("address_line1", &self.address_line1)?;
        let city = required("city", &self.city)?;
        let state = required("state", &self.state)?;
        let pincode = Pincode::parse(&self.pincode)?;
        let country = match self.country.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => DEFAULT_COUNTRY.to_string(),
        };

        Ok(Address {
            id: AddressId::new(),
            customer_id,
            address_line1,
            address_line2: optional(self.address_line2),
            city,
            state,
            pincode,
            country,
            is_default: self.is_default || !has_existing,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of an address; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPatch {
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressPatch {
    /// Apply the field changes. `is_default` is only copied onto this row;
    /// clearing the flag on sibling rows is `set_default`'s job.
    pub fn apply_to(&self, address: &mut Address, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(v) = &self.address_line1 {
            address.address_line1 = required("address_line1", v)?;
        }
        if let Some(v) = &self.address_line2 {
            address.address_line2 = optional(Some(v.clone()));
        }
        if let Some(v) = &self.city {
            address.city = required("city", v)?;
        }
        if let Some(v) = &self.state {
            address.state = required("state", v)?;
        }
        if let Some(v) = &self.pincode {
            address.pincode = Pincode::parse(v)?;
        }
        if let Some(v) = &self.country {
            address.country = required("country", v)?;
        }
        if let Some(flag) = self.is_default {
            address.is_default = flag;
        }
        address.updated_at = now;
        Ok(())
    }

    pub fn makes_default(&self) -> bool {
        self.is_default == Some(true)
    }
}

/// Make `chosen` the only default among one customer's addresses.
pub fn set_default(addresses: &mut [Address], chosen: AddressId) -> DomainResult<()> {
    if !addresses.iter().any(|a| a.id == chosen) {
        return Err(DomainError::not_found("address"));
    }
    for a in addresses.iter_mut() {
        a.is_default = a.id == chosen;
    }
    Ok(())
}

/// After a removal, make the newest address the default if none is.
///
/// Returns the promoted id, if any.
pub fn promote_newest_if_no_default(addresses: &mut [Address]) -> Option<AddressId> {
    if addresses.iter().any(|a| a.is_default) {
        return None;
    }
    let newest = addresses.iter_mut().max_by_key(|a| (a.created_at, a.id))?;
    newest.is_default = true;
    Some(newest.id)
}

/// Default first, then newest first.
pub fn sort_for_display(addresses: &mut [Address]) {
    addresses.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then(b.created_at.cmp(&a.created_at))
            .then(b.id.cmp(&a.id))
    });
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_address(is_default: bool) -> NewAddress {
        NewAddress {
            address_line1: "12 MG Road".to_string(),
            address_line2: Some("  ".to_string()),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
            country: None,
            is_default,
        }
    }

    #[test]
    fn first_address_becomes_default() {
        let customer = CustomerId::new();
        let a = new_address(false).into_address(customer, false, Utc::now()).unwrap();
        assert!(a.is_default);
        assert_eq!(a.country, "India");
        assert_eq!(a.address_line2, None);

        let b = new_address(false).into_address(customer, true, Utc::now()).unwrap();
        assert!(!b.is_default);
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut input = new_address(false);
        input.city = " ".to_string();
        let err = input.into_address(CustomerId::new(), false, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("city is required"));

        let mut input = new_address(false);
        input.pincode = "5600".to_string();
        assert!(input.into_address(CustomerId::new(), false, Utc::now()).is_err());
    }

    #[test]
    fn set_default_leaves_exactly_one() {
        let customer = CustomerId::new();
        let now = Utc::now();
        let first = new_address(true).into_address(customer, false, now).unwrap();
        let second = new_address(false).into_address(customer, true, now).unwrap();
        let second_id = second.id;
        let mut all = vec![first, second];

        set_default(&mut all, second_id).unwrap();
        assert_eq!(all.iter().filter(|a| a.is_default).count(), 1);
        assert!(all.iter().find(|a| a.id == second_id).unwrap().is_default);
    }

    #[test]
    fn set_default_unknown_id_is_not_found() {
        let mut all = vec![new_address(true).into_address(CustomerId::new(), false, Utc::now()).unwrap()];
        assert_eq!(set_default(&mut all, AddressId::new()), Err(DomainError::not_found("address")));
        assert!(all[0].is_default);
    }

    #[test]
    fn promote_picks_newest_when_default_removed() {
        let customer = CustomerId::new();
        let now = Utc::now();
        let older = new_address(false).into_address(customer, true, now).unwrap();
        let newer = new_address(false)
            .into_address(customer, true, now + Duration::minutes(5))
            .unwrap();
        let newer_id = newer.id;
        let mut rest = vec![older, newer];

        assert_eq!(promote_newest_if_no_default(&mut rest), Some(newer_id));
        assert_eq!(promote_newest_if_no_default(&mut rest), None);
        assert_eq!(promote_newest_if_no_default(&mut []), None);
    }

    #[test]
    fn patch_keeps_unspecified_fields() {
        let mut a = new_address(false).into_address(CustomerId::new(), false, Utc::now()).unwrap();
        let patch = AddressPatch { city: Some("Mysuru".to_string()), ..Default::default() };
        patch.apply_to(&mut a, Utc::now()).unwrap();
        assert_eq!(a.city, "Mysuru");
        assert_eq!(a.address_line1, "12 MG Road");
        assert_eq!(a.pincode.as_str(), "560001");
        assert!(a.is_default);
        assert!(!patch.makes_default());
    }

    #[test]
    fn display_order_is_default_then_newest() {
        let customer = CustomerId::new();
        let now = Utc::now();
        let default = new_address(true).into_address(customer, false, now).unwrap();
        let newer = new_address(false).into_address(customer, true, now + Duration::minutes(1)).unwrap();
        let newest = new_address(false).into_address(customer, true, now + Duration::minutes(2)).unwrap();
        let (d, n1, n2) = (default.id, newer.id, newest.id);

        let mut all = vec![newer, default, newest];
        sort_for_display(&mut all);
        assert_eq!(all.iter().map(|a| a.id).collect::<Vec<_>>(), vec![d, n2, n1]);
    }
}
