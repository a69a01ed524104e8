//! Catalog domain module: categories, brands, products and stock.

pub mod product;
pub mod taxonomy;

pub use product::{NewProduct, Product, ProductFilter, ProductPatch, StockAdjustment, MAX_STOCK_QUANTITY};
pub use taxonomy::{Brand, Category, NewTaxon, slugify};
