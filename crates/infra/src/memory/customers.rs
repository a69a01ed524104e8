use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herbstore_core::{AddressId, CustomerId, Mobile};
use herbstore_customers::{
    promote_newest_if_no_default, set_default, sort_for_display, Address, AddressPatch, Customer,
    CustomerFilter, CustomerPatch, NewAddress,
};

use super::{paginate, InMemoryStore};
use crate::error::{StoreError, StoreResult};
use crate::store::{AddressStore, CustomerStore};

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn find_customer(&self, id: CustomerId) -> StoreResult<Option<Customer>> {
        Ok(self.read()?.customers.get(&id).cloned())
    }

    async fn find_customer_by_mobile(&self, mobile: &Mobile) -> StoreResult<Option<Customer>> {
        Ok(self
            .read()?
            .customers
            .values()
            .find(|c| &c.mobile == mobile)
            .cloned())
    }

    async fn insert_customer(&self, customer: &Customer) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.customers.values().any(|c| c.mobile == customer.mobile) {
            return Err(StoreError::Conflict(
                "a customer with this mobile already exists".to_string(),
            ));
        }
        t.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        patch: &CustomerPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Customer> {
        let mut t = self.write()?;
        let customer = t
            .customers
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("customer"))?;
        let mut updated = customer.clone();
        patch.apply_to(&mut updated, now)?;
        *customer = updated.clone();
        Ok(updated)
    }

    async fn record_customer_login(&self, id: CustomerId, now: DateTime<Utc>) -> StoreResult<Customer> {
        let mut t = self.write()?;
        let customer = t
            .customers
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("customer"))?;
        customer.last_login = Some(now);
        customer.updated_at = now;
        Ok(customer.clone())
    }

    async fn list_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>> {
        let t = self.read()?;
        let mut rows: Vec<Customer> = t
            .customers
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, filter.limit, filter.offset))
    }
}

#[async_trait]
impl AddressStore for InMemoryStore {
    async fn list_addresses(&self, customer_id: CustomerId) -> StoreResult<Vec<Address>> {
        let mut rows = self.read()?.addresses_of(customer_id);
        sort_for_display(&mut rows);
        Ok(rows)
    }

    async fn find_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> StoreResult<Option<Address>> {
        Ok(self
            .read()?
            .addresses
            .get(&address_id)
            .filter(|a| a.customer_id == customer_id)
            .cloned())
    }

    async fn insert_address(
        &self,
        customer_id: CustomerId,
        input: NewAddress,
        now: DateTime<Utc>,
    ) -> StoreResult<Address> {
        let mut t = self.write()?;
        if !t.customers.contains_key(&customer_id) {
            return Err(StoreError::not_found("customer"));
        }
        let mut mine = t.addresses_of(customer_id);
        let address = input.into_address(customer_id, !mine.is_empty(), now)?;
        let id = address.id;
        let is_default = address.is_default;
        mine.push(address);
        if is_default {
            set_default(&mut mine, id)?;
        }
        for a in mine {
            t.addresses.insert(a.id, a);
        }
        t.addresses
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("address"))
    }

    async fn update_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
        patch: &AddressPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Address> {
        let mut t = self.write()?;
        let mut mine = t.addresses_of(customer_id);
        let target = mine
            .iter_mut()
            .find(|a| a.id == address_id)
            .ok_or_else(|| StoreError::not_found("address"))?;
        patch.apply_to(target, now)?;
        if patch.makes_default() {
            set_default(&mut mine, address_id)?;
        }
        for a in mine {
            t.addresses.insert(a.id, a);
        }
        t.addresses
            .get(&address_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("address"))
    }

    async fn set_default_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
        now: DateTime<Utc>,
    ) -> StoreResult<Address> {
        let mut t = self.write()?;
        let mut mine = t.addresses_of(customer_id);
        set_default(&mut mine, address_id)?;
        for mut a in mine {
            if a.id == address_id {
                a.updated_at = now;
            }
            t.addresses.insert(a.id, a);
        }
        t.addresses
            .get(&address_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("address"))
    }

    async fn delete_address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> StoreResult<Address> {
        let mut t = self.write()?;
        let owned = t
            .addresses
            .get(&address_id)
            .is_some_and(|a| a.customer_id == customer_id);
        if !owned {
            return Err(StoreError::not_found("address"));
        }
        let removed = t
            .addresses
            .remove(&address_id)
            .ok_or_else(|| StoreError::not_found("address"))?;

        if removed.is_default {
            let mut rest = t.addresses_of(customer_id);
            if let Some(promoted) = promote_newest_if_no_default(&mut rest) {
                tracing::debug!(%customer_id, address_id = %promoted, "promoted newest address to default");
            }
            for a in rest {
                t.addresses.insert(a.id, a);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_address(line1: &str, is_default: bool) -> NewAddress {
        NewAddress {
            address_line1: line1.to_string(),
            address_line2: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            pincode: "411001".to_string(),
            country: None,
            is_default,
        }
    }

    async fn store_with_customer() -> (InMemoryStore, CustomerId) {
        let store = InMemoryStore::new();
        let customer = Customer::register(Mobile::parse("9123456780").unwrap(), Utc::now());
        store.insert_customer(&customer).await.unwrap();
        (store, customer.id)
    }

    fn defaults(rows: &[Address]) -> usize {
        rows.iter().filter(|a| a.is_default).count()
    }

    #[tokio::test]
    async fn duplicate_mobile_is_a_conflict() {
        let (store, _) = store_with_customer().await;
        let dup = Customer::register(Mobile::parse("9123456780").unwrap(), Utc::now());
        assert!(matches!(store.insert_customer(&dup).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn second_default_address_clears_the_first() {
        let (store, customer) = store_with_customer().await;
        let now = Utc::now();
        let first = store.insert_address(customer, new_address("A", false), now).await.unwrap();
        assert!(first.is_default);

        let second = store
            .insert_address(customer, new_address("B", true), now + Duration::seconds(1))
            .await
            .unwrap();
        let all = store.list_addresses(customer).await.unwrap();
        assert_eq!(defaults(&all), 1);
        assert_eq!(all[0].id, second.id);
        assert!(!store.find_address(customer, first.id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn patch_with_is_default_swaps_the_default() {
        let (store, customer) = store_with_customer().await;
        let now = Utc::now();
        store.insert_address(customer, new_address("A", false), now).await.unwrap();
        let b = store.insert_address(customer, new_address("B", false), now).await.unwrap();

        let patch = AddressPatch { is_default: Some(true), ..Default::default() };
        let updated = store.update_address(customer, b.id, &patch, now).await.unwrap();
        assert!(updated.is_default);
        assert_eq!(defaults(&store.list_addresses(customer).await.unwrap()), 1);
    }

    #[tokio::test]
    async fn deleting_default_promotes_newest_remaining() {
        let (store, customer) = store_with_customer().await;
        let now = Utc::now();
        let a = store.insert_address(customer, new_address("A", false), now).await.unwrap();
        store
            .insert_address(customer, new_address("B", false), now + Duration::minutes(1))
            .await
            .unwrap();
        let c = store
            .insert_address(customer, new_address("C", false), now + Duration::minutes(2))
            .await
            .unwrap();

        let removed = store.delete_address(customer, a.id).await.unwrap();
        assert!(removed.is_default);
        let rest = store.list_addresses(customer).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(defaults(&rest), 1);
        assert_eq!(rest[0].id, c.id);
    }

    #[tokio::test]
    async fn other_customers_address_is_not_found() {
        let (store, customer) = store_with_customer().await;
        let other = Customer::register(Mobile::parse("9000000001").unwrap(), Utc::now());
        store.insert_customer(&other).await.unwrap();
        let a = store.insert_address(customer, new_address("A", false), Utc::now()).await.unwrap();

        assert!(store.find_address(other.id, a.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_address(other.id, a.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.set_default_address(other.id, a.id, Utc::now()).await,
            Err(StoreError::Domain(_))
        ));
    }

    #[tokio::test]
    async fn customer_search_and_login_stamp() {
        let (store, customer) = store_with_customer().await;
        let stamped = store.record_customer_login(customer, Utc::now()).await.unwrap();
        assert!(stamped.last_login.is_some());

        let filter = CustomerFilter { search: Some("91234".to_string()), ..Default::default() };
        assert_eq!(store.list_customers(&filter).await.unwrap().len(), 1);
        let filter = CustomerFilter { search: Some("nobody".to_string()), ..Default::default() };
        assert!(store.list_customers(&filter).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_default_swaps_leave_one_default() {
        let (store, customer) = store_with_customer().await;
        let store = std::sync::Arc::new(store);
        let now = Utc::now();
        let mut ids = Vec::new();
        for line in ["A", "B", "C", "D"] {
            ids.push(store.insert_address(customer, new_address(line, false), now).await.unwrap().id);
        }

        let handles: Vec<_> = ids
            .iter()
            .flat_map(|id| [*id, *id])
            .enumerate()
            .map(|(i, id)| {
                let store = store.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        store.set_default_address(customer, id, now).await.unwrap();
                    } else {
                        let patch = AddressPatch { is_default: Some(true), ..Default::default() };
                        store.update_address(customer, id, &patch, now).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(defaults(&store.list_addresses(customer).await.unwrap()), 1);
    }
}
