use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herbstore_core::{Amount, BrandId, CategoryId, DomainError, DomainResult, Entity, ProductId};

use crate::taxonomy::slugify;

/// Largest stock level a product may hold (the `INTEGER` column's range).
pub const MAX_STOCK_QUANTITY: u32 = i32::MAX as u32;

/// Sellable product.
///
/// # Invariants
/// - `price <= mrp`
/// - `0 <= stock_quantity <= MAX_STOCK_QUANTITY`
/// - inactive products are hidden from the storefront but kept for order history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub price: Amount,
    pub mrp: Amount,
    pub stock_quantity: u32,
    pub requires_prescription: bool,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    pub fn adjust_stock(&mut self, adjustment: StockAdjustment, now: DateTime<Utc>) -> DomainResult<()> {
        let available = self.stock_quantity;
        let delta = adjustment.delta;
        let next = i64::from(available)
            .checked_add(delta)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= MAX_STOCK_QUANTITY);
        let next = match next {
            Some(n) => n,
            None if delta < 0 => {
                return Err(DomainError::validation(format!(
                    "insufficient stock: {available} available, adjustment {delta}"
                )));
            }
            None => {
                return Err(DomainError::validation(format!(
                    "stock adjustment {delta} exceeds the maximum stock level"
                )));
            }
        };
        self.stock_quantity = next;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub price: Amount,
    /// Defaults to `price`.
    pub mrp: Option<Amount>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default)]
    pub requires_prescription: bool,
    pub image_url: Option<String>,
}

impl NewProduct {
    pub fn into_product(self, now: DateTime<Utc>) -> DomainResult<Product> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        let slug = slugify(self.slug.as_deref().unwrap_or(&name));
        if slug.is_empty() {
            return Err(DomainError::validation("slug must contain letters or digits"));
        }
        let mrp = self.mrp.unwrap_or(self.price);
        check_price(self.price, mrp)?;
        check_stock(self.stock_quantity)?;

        Ok(Product {
            id: ProductId::new(),
            name,
            slug,
            description: self.description.filter(|d| !d.trim().is_empty()),
            category_id: self.category_id,
            brand_id: self.brand_id,
            price: self.price,
            mrp,
            stock_quantity: self.stock_quantity,
            requires_prescription: self.requires_prescription,
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a product; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub price: Option<Amount>,
    pub mrp: Option<Amount>,
    pub stock_quantity: Option<u32>,
    pub requires_prescription: Option<bool>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

impl ProductPatch {
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) -> DomainResult<()> {
        let price = self.price.unwrap_or(product.price);
        let mrp = self.mrp.unwrap_or(product.mrp);
        check_price(price, mrp)?;
        if let Some(q) = self.stock_quantity {
            check_stock(q)?;
        }

        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DomainError::validation("name must not be empty"));
            }
            product.name = name.to_string();
        }
        if let Some(d) = &self.description {
            product.description = Some(d.clone());
        }
        if let Some(c) = self.category_id {
            product.category_id = Some(c);
        }
        if let Some(b) = self.brand_id {
            product.brand_id = Some(b);
        }
        product.price = price;
        product.mrp = mrp;
        if let Some(q) = self.stock_quantity {
            product.stock_quantity = q;
        }
        if let Some(rx) = self.requires_prescription {
            product.requires_prescription = rx;
        }
        if let Some(url) = &self.image_url {
            product.image_url = Some(url.clone());
        }
        if let Some(active) = self.is_active {
            product.is_active = active;
        }
        product.updated_at = now;
        Ok(())
    }
}

fn check_stock(quantity: u32) -> DomainResult<()> {
    if quantity > MAX_STOCK_QUANTITY {
        return Err(DomainError::validation(format!(
            "stock_quantity must not exceed {MAX_STOCK_QUANTITY}"
        )));
    }
    Ok(())
}

fn check_price(price: Amount, mrp: Amount) -> DomainResult<()> {
    if price.value() > mrp.value() {
        return Err(DomainError::validation("price must not exceed mrp"));
    }
    Ok(())
}

/// Storefront listing filter. Inactive products are excluded unless
/// `include_inactive` is set (back office).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.is_active {
            return false;
        }
        if self.category_id.is_some() && self.category_id != product.category_id {
            return false;
        }
        if self.brand_id.is_some() && self.brand_id != product.brand_id {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => product.name.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn rupees(v: i64) -> Amount {
        Amount::new(Decimal::new(v, 0)).unwrap()
    }

    fn product() -> Product {
        NewProduct {
            name: "Ashwagandha Tablets".to_string(),
            slug: None,
            description: None,
            category_id: None,
            brand_id: None,
            price: rupees(180),
            mrp: Some(rupees(200)),
            stock_quantity: 5,
            requires_prescription: false,
            image_url: None,
        }
        .into_product(Utc::now())
        .unwrap()
    }

    #[test]
    fn new_product_defaults() {
        let p = product();
        assert_eq!(p.slug, "ashwagandha-tablets");
        assert!(p.is_active);
        assert!(p.in_stock());
    }

    #[test]
    fn price_above_mrp_is_rejected() {
        let mut p = product();
        let patch = ProductPatch { price: Some(rupees(250)), ..Default::default() };
        assert!(patch.apply_to(&mut p, Utc::now()).is_err());
        assert_eq!(p.price, rupees(180));

        let patch = ProductPatch { price: Some(rupees(250)), mrp: Some(rupees(300)), ..Default::default() };
        patch.apply_to(&mut p, Utc::now()).unwrap();
        assert_eq!(p.price, rupees(250));
    }

    #[test]
    fn stock_cannot_go_negative() {
        let mut p = product();
        p.adjust_stock(StockAdjustment { delta: -5 }, Utc::now()).unwrap();
        assert_eq!(p.stock_quantity, 0);
        assert!(!p.in_stock());
        assert!(p.adjust_stock(StockAdjustment { delta: -1 }, Utc::now()).is_err());
        assert_eq!(p.stock_quantity, 0);
        p.adjust_stock(StockAdjustment { delta: 12 }, Utc::now()).unwrap();
        assert_eq!(p.stock_quantity, 12);
    }

    #[test]
    fn extreme_stock_adjustments_are_rejected_without_change() {
        let mut p = product();
        for delta in [i64::MAX, i64::MIN, i64::from(MAX_STOCK_QUANTITY)] {
            let err = p.adjust_stock(StockAdjustment { delta }, Utc::now()).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
            assert_eq!(p.stock_quantity, 5);
        }
        p.adjust_stock(StockAdjustment { delta: i64::from(MAX_STOCK_QUANTITY) - 5 }, Utc::now()).unwrap();
        assert_eq!(p.stock_quantity, MAX_STOCK_QUANTITY);
    }

    #[test]
    fn stock_above_column_range_is_rejected() {
        let mut p = product();
        let patch = ProductPatch { stock_quantity: Some(u32::MAX), ..Default::default() };
        assert!(patch.apply_to(&mut p, Utc::now()).is_err());
        assert_eq!(p.stock_quantity, 5);
    }

    #[test]
    fn filter_hides_inactive_and_matches_search() {
        let mut p = product();
        let search = ProductFilter { search: Some("ASHWA".to_string()), ..Default::default() };
        assert!(search.matches(&p));
        assert!(!ProductFilter { brand_id: Some(BrandId::new()), ..Default::default() }.matches(&p));

        p.deactivate(Utc::now());
        assert!(!search.matches(&p));
        assert!(ProductFilter { include_inactive: true, ..Default::default() }.matches(&p));
    }
}
