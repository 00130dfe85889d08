//! Offer lifecycle: states, events and the transition table.
//!
//! | From                                 | Event               | To                    |
//! |--------------------------------------|---------------------|-----------------------|
//! | active                               | request reservation | reservation_pending   |
//! | reservation_pending                  | approve             | reserved              |
//! | reservation_pending                  | reject              | active                |
//! | active, reserved                     | finalize sale       | sold                  |
//! | active, reservation_pending, reserved| cancel              | expired               |
//!
//! Every other pair is illegal.

use serde::{Deserialize, Serialize};

/// Offer status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    ReservationPending,
    Reserved,
    Sold,
    Expired,
}

/// How a non-terminal offer holds its quantity against the lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldKind {
    /// Pipeline hold (`active`, `reservation_pending`).
    Soft,
    /// Approved reservation (`reserved`).
    Hard,
}

/// Events that move an offer through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferTransition {
    RequestReservation,
    ApproveReservation,
    RejectReservation,
    FinalizeSale,
    Cancel,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 5] = [
        OfferStatus::Active,
        OfferStatus::ReservationPending,
        OfferStatus::Reserved,
        OfferStatus::Sold,
        OfferStatus::Expired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Active => "active",
            OfferStatus::ReservationPending => "reservation_pending",
            OfferStatus::Reserved => "reserved",
            OfferStatus::Sold => "sold",
            OfferStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OfferStatus::Sold | OfferStatus::Expired)
    }

    /// Open sales opportunity (every non-terminal status).
    pub fn is_pipeline(self) -> bool {
        !self.is_terminal()
    }

    /// Hold placed on the lot's stock while the offer is in this status.
    ///
    /// Soft and hard holds are both deducted from `available`; the split only
    /// exists so views can tell pipeline from approved reservations.
    pub fn hold(self) -> Option<HoldKind> {
        match self {
            OfferStatus::Active | OfferStatus::ReservationPending => Some(HoldKind::Soft),
            OfferStatus::Reserved => Some(HoldKind::Hard),
            OfferStatus::Sold | OfferStatus::Expired => None,
        }
    }

    /// Apply a lifecycle event. `None` means the transition is illegal.
    ///
    /// This is the only place the transition table is encoded.
    pub fn next(self, transition: OfferTransition) -> Option<OfferStatus> {
        use OfferStatus::*;
        use OfferTransition::*;

        match (self, transition) {
            (Active, RequestReservation) => Some(ReservationPending),
            (ReservationPending, ApproveReservation) => Some(Reserved),
            (ReservationPending, RejectReservation) => Some(Active),
            (Active | Reserved, FinalizeSale) => Some(Sold),
            (Active | ReservationPending | Reserved, Cancel) => Some(Expired),
            (
                Active | ReservationPending | Reserved | Sold | Expired,
                RequestReservation | ApproveReservation | RejectReservation | FinalizeSale | Cancel,
            ) => None,
        }
    }
}

impl core::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OfferTransition {
    pub const ALL: [OfferTransition; 5] = [
        OfferTransition::RequestReservation,
        OfferTransition::ApproveReservation,
        OfferTransition::RejectReservation,
        OfferTransition::FinalizeSale,
        OfferTransition::Cancel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OfferTransition::RequestReservation => "request reservation",
            OfferTransition::ApproveReservation => "approve reservation",
            OfferTransition::RejectReservation => "reject reservation",
            OfferTransition::FinalizeSale => "finalize sale",
            OfferTransition::Cancel => "cancel",
        }
    }

    /// Only the central authority may decide on a pending reservation.
    pub fn requires_authority(self) -> bool {
        matches!(
            self,
            OfferTransition::ApproveReservation | OfferTransition::RejectReservation
        )
    }
}
