//! `herbstore-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AddressId, AdminId, BrandId, CategoryId, CustomerId, PaymentId, ProductId};
pub use value_object::{Amount, Mobile, Pincode, ValueObject};
