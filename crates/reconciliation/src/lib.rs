//! Inventory reconciliation engine.
//!
//! Derives the authoritative per-lot `available / reserved / sold` breakdown
//! from the lot, delegation and offer ledgers, and partitions offers into
//! pipeline and sales views. Everything here is pure: the same ledgers always
//! reconcile to the same result, and nothing reads a clock.
//!
//! [`Ledgers`] holds the three ledgers of one tenant and implements every
//! mutation as validate-then-apply on `&mut self`; callers run mutations on a
//! working copy and swap it in only when the whole operation succeeded.

pub mod engine;
pub mod kpi;
pub mod ledgers;
pub mod snapshot;

pub use engine::{EnrichedOffer, LotSummary, Reconciliation, lot_snapshot, reconcile, reconcile_for_display};
pub use kpi::{OfferBook, SalesKpis};
pub use ledgers::{
    Applied, FloorPricePolicy, FloorPriceWarning, LedgerEvent, Ledgers, OfferRequest, PlacedOffer,
};
pub use snapshot::QuantitySnapshot;
