//! Offer ledger and offer lifecycle (event-sourced).
//!
//! An offer proposes a quantity of a lot to a named client at a unit price,
//! either directly by the industry or through a seller's delegation. Its
//! status only moves along the transitions defined in [`status`].

pub mod offer;
pub mod status;

pub use offer::{
    AccessToken, AdvanceOffer, Offer, OfferCommand, OfferEvent, OfferId, OfferPlaced,
    OfferStatusChanged, OfferView, OfferViewed, PlaceOffer, RecordView,
};
pub use status::{HoldKind, OfferStatus, OfferTransition};
