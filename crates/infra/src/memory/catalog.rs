use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herbstore_catalog::{Brand, Category, Product, ProductFilter, ProductPatch, StockAdjustment};
use herbstore_core::ProductId;

use super::{paginate, InMemoryStore};
use crate::error::{StoreError, StoreResult};
use crate::store::CatalogStore;

fn slug_taken() -> StoreError {
    StoreError::Conflict("slug already in use".to_string())
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_categories(&self, include_inactive: bool) -> StoreResult<Vec<Category>> {
        let mut rows: Vec<Category> = self
            .read()?
            .categories
            .values()
            .filter(|c| include_inactive || c.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.categories.values().any(|c| c.slug == category.slug) {
            return Err(slug_taken());
        }
        t.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn list_brands(&self, include_inactive: bool) -> StoreResult<Vec<Brand>> {
        let mut rows: Vec<Brand> = self
            .read()?
            .brands
            .values()
            .filter(|b| include_inactive || b.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn insert_brand(&self, brand: &Brand) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.brands.values().any(|b| b.slug == brand.slug) {
            return Err(slug_taken());
        }
        t.brands.insert(brand.id, brand.clone());
        Ok(())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let mut rows: Vec<Product> = self
            .read()?
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, filter.limit, filter.offset))
    }

    async fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut t = self.write()?;
        if t.products.values().any(|p| p.slug == product.slug) {
            return Err(slug_taken());
        }
        if let Some(c) = product.category_id {
            if !t.categories.contains_key(&c) {
                return Err(StoreError::ForeignKey(format!("category {c} does not exist")));
            }
        }
        if let Some(b) = product.brand_id {
            if !t.brands.contains_key(&b) {
                return Err(StoreError::ForeignKey(format!("brand {b} does not exist")));
            }
        }
        t.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let mut t = self.write()?;
        if let Some(c) = patch.category_id {
            if !t.categories.contains_key(&c) {
                return Err(StoreError::ForeignKey(format!("category {c} does not exist")));
            }
        }
        if let Some(b) = patch.brand_id {
            if !t.brands.contains_key(&b) {
                return Err(StoreError::ForeignKey(format!("brand {b} does not exist")));
            }
        }
        let product = t
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product"))?;
        let mut updated = product.clone();
        patch.apply_to(&mut updated, now)?;
        *product = updated.clone();
        Ok(updated)
    }

    async fn adjust_stock(
        &self,
        id: ProductId,
        adjustment: StockAdjustment,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let mut t = self.write()?;
        let product = t
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product"))?;
        product.adjust_stock(adjustment, now)?;
        Ok(product.clone())
    }

    async fn deactivate_product(&self, id: ProductId, now: DateTime<Utc>) -> StoreResult<Product> {
        let mut t = self.write()?;
        let product = t
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product"))?;
        product.deactivate(now);
        Ok(product.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herbstore_catalog::{NewProduct, NewTaxon};
    use herbstore_core::Amount;
    use rust_decimal::Decimal;

    fn product(name: &str, stock: u32) -> Product {
        NewProduct {
            name: name.to_string(),
            slug: None,
            description: None,
            category_id: None,
            brand_id: None,
            price: Amount::new(Decimal::new(99, 0)).unwrap(),
            mrp: None,
            stock_quantity: stock,
            requires_prescription: false,
            image_url: None,
        }
        .into_product(Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_slugs_conflict() {
        let store = InMemoryStore::new();
        let cat = NewTaxon { name: "Skin Care".to_string(), slug: None }.into_category().unwrap();
        store.insert_category(&cat).await.unwrap();
        let again = NewTaxon { name: "skin care".to_string(), slug: None }.into_category().unwrap();
        assert!(matches!(store.insert_category(&again).await, Err(StoreError::Conflict(_))));

        store.insert_product(&product("Neem Soap", 1)).await.unwrap();
        assert!(matches!(
            store.insert_product(&product("Neem  Soap", 1)).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn unknown_category_is_a_foreign_key_error() {
        let store = InMemoryStore::new();
        let mut p = product("Aloe Gel", 3);
        p.category_id = Some(herbstore_core::CategoryId::new());
        assert!(matches!(store.insert_product(&p).await, Err(StoreError::ForeignKey(_))));
    }

    #[tokio::test]
    async fn stock_adjustment_and_soft_delete() {
        let store = InMemoryStore::new();
        let p = product("Tulsi Drops", 2);
        store.insert_product(&p).await.unwrap();

        let err = store
            .adjust_stock(p.id, StockAdjustment { delta: -3 }, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(_)));
        let after = store.adjust_stock(p.id, StockAdjustment { delta: 8 }, Utc::now()).await.unwrap();
        assert_eq!(after.stock_quantity, 10);

        store.deactivate_product(p.id, Utc::now()).await.unwrap();
        assert!(store.list_products(&ProductFilter::default()).await.unwrap().is_empty());
        assert!(!store.find_product(p.id).await.unwrap().unwrap().is_active);
    }
}
