use chrono::{DateTime, Utc};

/// A ledger fact, as recorded in the journal.
///
/// Implemented by the typed event enums of lots, delegations and offers. The
/// `event_type` string is what subscribers match on, so it must stay stable
/// once published; bump `version` when the payload shape changes.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// e.g. "offers.offer.placed".
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time carried by the command that produced the event.
    fn occurred_at(&self) -> DateTime<Utc>;
}
