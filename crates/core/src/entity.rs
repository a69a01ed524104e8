//! Entity trait: identity + continuity across state changes.

/// Records that are looked up by identity (customers, addresses, orders, ...).
///
/// Stores use this to key their tables without knowing the concrete type.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
