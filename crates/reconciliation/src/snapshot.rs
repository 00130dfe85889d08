use serde::{Deserialize, Serialize};

use stonetrade_core::{DomainError, ValueObject};
use stonetrade_lots::LotId;
use stonetrade_offers::{HoldKind, Offer, OfferStatus};

/// Derived stock breakdown for one lot.
///
/// `available + reserved + sold == total` always holds for a snapshot produced
/// without a fault. `reserved` is `soft_held + hard_held`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitySnapshot {
    pub lot_id: LotId,
    pub total: u64,
    pub available: u64,
    pub reserved: u64,
    pub sold: u64,
    /// Held by `active` / `reservation_pending` offers.
    pub soft_held: u64,
    /// Held by approved `reserved` offers.
    pub hard_held: u64,
}

impl ValueObject for QuantitySnapshot {}

impl QuantitySnapshot {
    pub fn is_conserved(&self) -> bool {
        u128::from(self.available) + u128::from(self.reserved) + u128::from(self.sold)
            == u128::from(self.total)
    }

    /// Nothing left to sell and nothing held: drops out of active-inventory views.
    pub fn is_fully_consumed(&self) -> bool {
        self.available == 0 && self.reserved == 0 && self.sold >= self.total
    }
}

/// Running per-lot totals while walking the offer ledger.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Tally {
    soft: u128,
    hard: u128,
    sold: u128,
}

/// Result of settling a tally against the lot's total.
#[derive(Debug, Clone)]
pub(crate) struct Settled {
    pub snapshot: QuantitySnapshot,
    pub fault: Option<DomainError>,
}

impl Tally {
    pub fn add(&mut self, offer: &Offer) {
        let quantity = u128::from(offer.quantity_offered());
        match (offer.status(), offer.status().hold()) {
            (OfferStatus::Sold, _) => self.sold += quantity,
            (_, Some(HoldKind::Soft)) => self.soft += quantity,
            (_, Some(HoldKind::Hard)) => self.hard += quantity,
            (_, None) => {}
        }
    }

    /// Turn the tally into a snapshot.
    ///
    /// Over-commitment yields a fault together with a display fallback whose
    /// `available` is clamped to zero.
    pub fn settle(self, lot_id: LotId, total: u64) -> Settled {
        let reserved = self.soft + self.hard;
        let committed = reserved + self.sold;
        let total_wide = u128::from(total);

        let fault = (committed > total_wide).then(|| {
            DomainError::reconciliation_fault(
                lot_id,
                format!(
                    "committed quantity {committed} (reserved {reserved}, sold {}) exceeds total {total}",
                    self.sold
                ),
            )
        });

        let snapshot = QuantitySnapshot {
            lot_id,
            total,
            available: narrow(total_wide.saturating_sub(committed)),
            reserved: narrow(reserved),
            sold: narrow(self.sold),
            soft_held: narrow(self.soft),
            hard_held: narrow(self.hard),
        };

        Settled { snapshot, fault }
    }
}

fn narrow(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stonetrade_core::AggregateId;

    fn lot_id() -> LotId {
        LotId::new(AggregateId::new())
    }

    #[test]
    fn untouched_lot_is_fully_available() {
        let settled = Tally::default().settle(lot_id(), 30);

        assert!(settled.fault.is_none());
        assert_eq!(settled.snapshot.available, 30);
        assert_eq!(settled.snapshot.reserved, 0);
        assert_eq!(settled.snapshot.sold, 0);
        assert!(settled.snapshot.is_conserved());
    }

    #[test]
    fn over_commitment_is_a_fault_with_clamped_fallback() {
        let tally = Tally { soft: 20, hard: 5, sold: 10 };
        let id = lot_id();

        let settled = tally.settle(id, 30);

        assert!(matches!(
            settled.fault,
            Some(DomainError::ReconciliationFault { lot_id, .. }) if lot_id == id.0
        ));
        assert_eq!(settled.snapshot.available, 0);
        assert!(!settled.snapshot.is_conserved());
    }

    #[test]
    fn fully_consumed_requires_everything_sold() {
        let sold_out = Tally { soft: 0, hard: 0, sold: 12 }.settle(lot_id(), 12).snapshot;
        let held = Tally { soft: 0, hard: 2, sold: 10 }.settle(lot_id(), 12).snapshot;

        assert!(sold_out.is_fully_consumed());
        assert!(!held.is_fully_consumed());
    }

    #[test]
    fn empty_lot_counts_as_consumed() {
        let snapshot = Tally::default().settle(lot_id(), 0).snapshot;
        assert!(snapshot.is_fully_consumed());
    }
}
