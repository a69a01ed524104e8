//! Customers and their saved delivery addresses.
//!
//! Pure domain logic (no IO, no HTTP, no storage): construction, validation,
//! typed patches and the default-address bookkeeping that stores apply inside
//! a single transaction.

pub mod address;
pub mod customer;

pub use address::{
    Address, AddressPatch, NewAddress, promote_newest_if_no_default, set_default, sort_for_display,
    DEFAULT_COUNTRY,
};
pub use customer::{Customer, CustomerFilter, CustomerPatch, DEFAULT_CUSTOMER_NAME};
