//! The reconciliation pass itself.

use std::collections::BTreeMap;

use stonetrade_core::{DomainError, DomainResult, Party, SellerId};
use stonetrade_delegations::{Delegation, DelegationId};
use stonetrade_lots::{Lot, LotId};
use stonetrade_offers::{Offer, OfferStatus};

use crate::kpi::{OfferBook, SalesKpis};
use crate::snapshot::{QuantitySnapshot, Tally};

/// Lot fields an offer view needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotSummary {
    pub lot_id: LotId,
    pub code: String,
    pub base_cost: u64,
    pub floor_price: u64,
}

impl LotSummary {
    fn of(lot: &Lot) -> Self {
        Self {
            lot_id: lot.id_typed(),
            code: lot.code().to_string(),
            base_cost: lot.base_cost(),
            floor_price: lot.floor_price(),
        }
    }
}

/// An offer with its lot and seller resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedOffer {
    pub offer: Offer,
    pub lot: LotSummary,
    /// Seller the offer is attributed to; `None` for direct industry sales.
    pub seller_id: Option<SellerId>,
    /// The delegation record, while it still exists.
    pub delegation: Option<Delegation>,
}

impl EnrichedOffer {
    pub fn is_direct(&self) -> bool {
        self.offer.delegation_id().is_none()
    }

    /// Sellers see only their own offers; direct offers are industry-only.
    pub fn is_visible_to(&self, viewer: Party) -> bool {
        match viewer {
            Party::Industry => true,
            Party::Seller(seller_id) => self.seller_id == Some(seller_id),
        }
    }

    /// Unit cost used for profit: true industry cost for the industry, the
    /// agreed floor for a seller.
    pub fn unit_cost_for(&self, viewer: Party) -> u64 {
        match viewer {
            Party::Industry => self.lot.base_cost,
            Party::Seller(_) => self
                .delegation
                .as_ref()
                .map(Delegation::agreed_min_price)
                .unwrap_or_else(|| self.offer.floor_price()),
        }
    }

    pub fn revenue(&self) -> u128 {
        self.offer.gross_value()
    }

    pub fn profit_for(&self, viewer: Party) -> i128 {
        let margin = i128::from(self.offer.final_price()) - i128::from(self.unit_cost_for(viewer));
        margin * i128::from(self.offer.quantity_offered())
    }
}

/// Output of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    snapshots: BTreeMap<LotId, QuantitySnapshot>,
    pipeline: Vec<EnrichedOffer>,
    sales: Vec<EnrichedOffer>,
    faults: Vec<DomainError>,
}

impl Reconciliation {
    pub fn snapshot(&self, lot_id: &LotId) -> Option<&QuantitySnapshot> {
        self.snapshots.get(lot_id)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &QuantitySnapshot> {
        self.snapshots.values()
    }

    /// Offers in `active`, `reservation_pending` or `reserved`.
    pub fn pipeline(&self) -> &[EnrichedOffer] {
        &self.pipeline
    }

    /// Offers in `sold`.
    pub fn sales(&self) -> &[EnrichedOffer] {
        &self.sales
    }

    /// Reconciliation faults found by a display pass (empty for strict passes).
    pub fn faults(&self) -> &[DomainError] {
        &self.faults
    }

    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    /// Lots that still belong in active-inventory views.
    pub fn active_inventory(&self) -> Vec<&QuantitySnapshot> {
        self.snapshots
            .values()
            .filter(|s| !s.is_fully_consumed())
            .collect()
    }

    /// Pipeline and sales restricted to what `viewer` may see.
    pub fn offer_book(&self, viewer: Party) -> OfferBook<'_> {
        OfferBook {
            viewer,
            pipeline: self.pipeline.iter().filter(|o| o.is_visible_to(viewer)).collect(),
            sales: self.sales.iter().filter(|o| o.is_visible_to(viewer)).collect(),
        }
    }

    /// KPIs over the viewer's visible offers (filtered before aggregation).
    pub fn kpis(&self, viewer: Party) -> SalesKpis {
        self.offer_book(viewer).kpis()
    }
}

/// Strict reconciliation: any invariant violation is returned as an error.
pub fn reconcile<'a>(
    lots: impl IntoIterator<Item = &'a Lot>,
    delegations: impl IntoIterator<Item = &'a Delegation>,
    offers: impl IntoIterator<Item = &'a Offer>,
) -> DomainResult<Reconciliation> {
    let reconciliation = run(lots, delegations, offers);
    match reconciliation.faults.first() {
        Some(fault) => Err(fault.clone()),
        None => Ok(reconciliation),
    }
}

/// Display reconciliation: faults are logged and kept on the result, and
/// over-committed lots show `available = 0`.
pub fn reconcile_for_display<'a>(
    lots: impl IntoIterator<Item = &'a Lot>,
    delegations: impl IntoIterator<Item = &'a Delegation>,
    offers: impl IntoIterator<Item = &'a Offer>,
) -> Reconciliation {
    let reconciliation = run(lots, delegations, offers);
    for fault in &reconciliation.faults {
        tracing::error!(error = %fault, "reconciliation fault; showing clamped snapshot");
    }
    reconciliation
}

/// Snapshot of a single lot, computed exactly as a full pass would.
pub fn lot_snapshot<'a>(
    lot: &Lot,
    offers: impl IntoIterator<Item = &'a Offer>,
) -> DomainResult<QuantitySnapshot> {
    let lot_id = lot.id_typed();
    let mut tally = Tally::default();
    for offer in offers.into_iter().filter(|o| o.lot_id() == lot_id) {
        tally.add(offer);
    }

    let settled = tally.settle(lot_id, lot.total());
    match settled.fault {
        Some(fault) => Err(fault),
        None => Ok(settled.snapshot),
    }
}

fn run<'a>(
    lots: impl IntoIterator<Item = &'a Lot>,
    delegations: impl IntoIterator<Item = &'a Delegation>,
    offers: impl IntoIterator<Item = &'a Offer>,
) -> Reconciliation {
    let lots: BTreeMap<LotId, &Lot> = lots.into_iter().map(|l| (l.id_typed(), l)).collect();
    let delegations: BTreeMap<DelegationId, &Delegation> =
        delegations.into_iter().map(|d| (d.id_typed(), d)).collect();

    let mut offers: Vec<&Offer> = offers.into_iter().collect();
    offers.sort_by_key(|o| o.id_typed());

    let mut tallies: BTreeMap<LotId, Tally> = lots.keys().map(|id| (*id, Tally::default())).collect();
    let mut pipeline = Vec::new();
    let mut sales = Vec::new();
    let mut faults = Vec::new();

    for offer in offers {
        let Some(lot) = lots.get(&offer.lot_id()) else {
            faults.push(DomainError::reconciliation_fault(
                offer.lot_id(),
                format!("offer {} references an unknown lot", offer.id_typed()),
            ));
            continue;
        };

        if let Some(tally) = tallies.get_mut(&offer.lot_id()) {
            tally.add(offer);
        }

        let delegation = offer
            .delegation_id()
            .and_then(|id| delegations.get(&id))
            .map(|d| (*d).clone());
        let enriched = EnrichedOffer {
            seller_id: delegation.as_ref().map(Delegation::seller_id).or(offer.seller_id()),
            delegation,
            lot: LotSummary::of(lot),
            offer: offer.clone(),
        };

        match offer.status() {
            OfferStatus::Sold => sales.push(enriched),
            status if status.is_pipeline() => pipeline.push(enriched),
            _ => {}
        }
    }

    let mut snapshots = BTreeMap::new();
    for (lot_id, tally) in tallies {
        let total = lots.get(&lot_id).map(|l| l.total()).unwrap_or(0);
        let settled = tally.settle(lot_id, total);
        if let Some(fault) = settled.fault {
            faults.push(fault);
        }
        snapshots.insert(lot_id, settled.snapshot);
    }

    Reconciliation {
        snapshots,
        pipeline,
        sales,
        faults,
    }
}
