//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**; two instances with the same attribute
/// values are the same value. They are immutable: to "change" one, derive a
/// new one. Per-lot quantity snapshots and view-log entries are value objects,
/// while lots, delegations and offers are entities.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct QuantitySnapshot { total: u64, available: u64, reserved: u64, sold: u64 }
///
/// impl ValueObject for QuantitySnapshot {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
