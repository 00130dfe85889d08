//! Ledger records with identity but no event history.

/// A record identified by id rather than by value.
///
/// Delegations implement this: they are appended and removed as a whole and
/// never replayed from events.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
