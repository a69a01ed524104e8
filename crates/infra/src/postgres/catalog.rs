use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

use herbstore_catalog::{Brand, Category, Product, ProductFilter, ProductPatch, StockAdjustment};
use herbstore_core::{Amount, BrandId, CategoryId, DomainError, ProductId};

use super::{like_pattern, page_i64, PostgresStore};
use crate::error::{decode, map_sqlx_error, StoreError, StoreResult};
use crate::store::CatalogStore;

#[derive(Debug, FromRow)]
struct TaxonRow {
    id: Uuid,
    name: String,
    slug: String,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    category_id: Option<Uuid>,
    brand_id: Option<Uuid>,
    price: Decimal,
    mrp: Decimal,
    stock_quantity: i32,
    requires_prescription: bool,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            category_id: row.category_id.map(CategoryId::from_uuid),
            brand_id: row.brand_id.map(BrandId::from_uuid),
            price: decode("product.price", Amount::new(row.price))?,
            mrp: decode("product.mrp", Amount::new(row.mrp))?,
            stock_quantity: decode("product.stock_quantity", u32::try_from(row.stock_quantity))?,
            requires_prescription: row.requires_prescription,
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn stock_column(stock: u32) -> StoreResult<i32> {
    i32::try_from(stock).map_err(|_| StoreError::Domain(DomainError::validation("stock_quantity too large")))
}

async fn lock_product(conn: &mut PgConnection, id: ProductId) -> StoreResult<Product> {
    sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT id, name, slug, description, category_id, brand_id, price, mrp, stock_quantity,
               requires_prescription, image_url, is_active, created_at, updated_at
        FROM product
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(conn)
    .await
    .map_err(|e| map_sqlx_error("lock_product", e))?
    .ok_or_else(|| StoreError::not_found("product"))?
    .try_into()
}

async fn write_product(conn: &mut PgConnection, p: &Product) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE product
        SET name = $2, description = $3, category_id = $4, brand_id = $5, price = $6, mrp = $7,
            stock_quantity = $8, requires_prescription = $9, image_url = $10, is_active = $11,
            updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(p.id.as_uuid())
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.category_id.map(|c| *c.as_uuid()))
    .bind(p.brand_id.map(|b| *b.as_uuid()))
    .bind(p.price.value())
    .bind(p.mrp.value())
    .bind(stock_column(p.stock_quantity)?)
    .bind(p.requires_prescription)
    .bind(&p.image_url)
    .bind(p.is_active)
    .bind(p.updated_at)
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error("write_product", e))?;
    Ok(())
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn list_categories(&self, include_inactive: bool) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, TaxonRow>(
            "SELECT id, name, slug, is_active FROM category WHERE ($1 OR is_active) ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
        Ok(rows
            .into_iter()
            .map(|r| Category {
                id: CategoryId::from_uuid(r.id),
                name: r.name,
                slug: r.slug,
                is_active: r.is_active,
            })
            .collect())
    }

    #[instrument(skip(self, category), fields(slug = %category.slug), err)]
    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO category (id, name, slug, is_active) VALUES ($1, $2, $3, $4)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.slug)
            .bind(category.is_active)
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn list_brands(&self, include_inactive: bool) -> StoreResult<Vec<Brand>> {
        let rows = sqlx::query_as::<_, TaxonRow>(
            "SELECT id, name, slug, is_active FROM brand WHERE ($1 OR is_active) ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list_brands", e))?;
        Ok(rows
            .into_iter()
            .map(|r| Brand {
                id: BrandId::from_uuid(r.id),
                name: r.name,
                slug: r.slug,
                is_active: r.is_active,
            })
            .collect())
    }

    #[instrument(skip(self, brand), fields(slug = %brand.slug), err)]
    async fn insert_brand(&self, brand: &Brand) -> StoreResult<()> {
        sqlx::query("INSERT INTO brand (id, name, slug, is_active) VALUES ($1, $2, $3, $4)")
            .bind(brand.id.as_uuid())
            .bind(&brand.name)
            .bind(&brand.slug)
            .bind(brand.is_active)
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("insert_brand", e))?;
        Ok(())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let (limit, offset) = page_i64(filter.limit, filter.offset);
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, slug, description, category_id, brand_id, price, mrp, stock_quantity,
                   requires_prescription, image_url, is_active, created_at, updated_at
            FROM product
            WHERE ($1 OR is_active)
              AND ($2::uuid IS NULL OR category_id = $2)
              AND ($3::uuid IS NULL OR brand_id = $3)
              AND ($4::text IS NULL OR name ILIKE $4)
            ORDER BY name, id
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.include_inactive)
        .bind(filter.category_id.map(|c| *c.as_uuid()))
        .bind(filter.brand_id.map(|b| *b.as_uuid()))
        .bind(like_pattern(filter.search.as_deref()))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn find_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, slug, description, category_id, brand_id, price, mrp, stock_quantity,
                   requires_prescription, image_url, is_active, created_at, updated_at
            FROM product
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?
        .map(Product::try_from)
        .transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product (id, name, slug, description, category_id, brand_id, price, mrp,
                                 stock_quantity, requires_prescription, image_url, is_active,
                                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.category_id.map(|c| *c.as_uuid()))
        .bind(product.brand_id.map(|b| *b.as_uuid()))
        .bind(product.price.value())
        .bind(product.mrp.value())
        .bind(stock_column(product.stock_quantity)?)
        .bind(product.requires_prescription)
        .bind(&product.image_url)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, patch), fields(product_id = %id), err)]
    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let mut product = lock_product(&mut tx, id).await?;
        patch.apply_to(&mut product, now)?;
        write_product(&mut tx, &product).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id, delta = adjustment.delta), err)]
    async fn adjust_stock(
        &self,
        id: ProductId,
        adjustment: StockAdjustment,
        now: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let mut tx = self.pool().begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let mut product = lock_product(&mut tx, id).await?;
        product.adjust_stock(adjustment, now)?;
        write_product(&mut tx, &product).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn deactivate_product(&self, id: ProductId, now: DateTime<Utc>) -> StoreResult<Product> {
        sqlx::query_as::<_, ProductRow>(
            r#"
            UPDATE product SET is_active = FALSE, updated_at = $2
            WHERE id = $1
            RETURNING id, name, slug, description, category_id, brand_id, price, mrp, stock_quantity,
                      requires_prescription, image_url, is_active, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("deactivate_product", e))?
        .ok_or_else(|| StoreError::not_found("product"))?
        .try_into()
    }
}
