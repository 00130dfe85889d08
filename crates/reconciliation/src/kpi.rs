use serde::{Deserialize, Serialize};

use stonetrade_core::Party;

use crate::engine::EnrichedOffer;

/// Pipeline and sales as seen by one party.
#[derive(Debug, Clone)]
pub struct OfferBook<'a> {
    pub viewer: Party,
    pub pipeline: Vec<&'a EnrichedOffer>,
    pub sales: Vec<&'a EnrichedOffer>,
}

/// Headline figures for a viewer. Money in the smallest currency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesKpis {
    pub pipeline_revenue: u128,
    pub sold_revenue: u128,
    /// Over sales only; negative when selling under cost.
    pub profit: i128,
    pub pipeline_count: usize,
    pub sales_count: usize,
    pub pipeline_quantity: u128,
    pub sold_quantity: u128,
}

impl OfferBook<'_> {
    pub fn kpis(&self) -> SalesKpis {
        SalesKpis {
            pipeline_revenue: self.pipeline.iter().map(|o| o.revenue()).sum(),
            sold_revenue: self.sales.iter().map(|o| o.revenue()).sum(),
            profit: self.sales.iter().map(|o| o.profit_for(self.viewer)).sum(),
            pipeline_count: self.pipeline.len(),
            sales_count: self.sales.len(),
            pipeline_quantity: self
                .pipeline
                .iter()
                .map(|o| u128::from(o.offer.quantity_offered()))
                .sum(),
            sold_quantity: self
                .sales
                .iter()
                .map(|o| u128::from(o.offer.quantity_offered()))
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use stonetrade_core::{Party, SellerId};
    use stonetrade_offers::OfferStatus;

    use crate::ledgers::fixtures::Desk;

    #[test]
    fn industry_kpis_use_base_cost() {
        let mut desk = Desk::new();
        let lot_id = desk.lot_priced(30, 4_000, 6_000);
        desk.offer_in(lot_id, None, 2, OfferStatus::Sold);
        desk.offer_in(lot_id, None, 3, OfferStatus::Reserved);

        let kpis = desk.ledgers.reconcile().unwrap().kpis(Party::Industry);

        assert_eq!(kpis.sold_revenue, 14_000);
        assert_eq!(kpis.pipeline_revenue, 21_000);
        assert_eq!(kpis.profit, 6_000);
        assert_eq!(kpis.sales_count, 1);
        assert_eq!(kpis.pipeline_quantity, 3);
    }

    #[test]
    fn seller_kpis_use_agreed_floor_and_own_offers_only() {
        let mut desk = Desk::new();
        let lot_id = desk.lot_priced(30, 4_000, 6_000);
        let seller = SellerId::new();
        let delegation = desk.delegate(lot_id, seller, 10);
        desk.offer_in(lot_id, Some(delegation), 2, OfferStatus::Sold);
        desk.offer_in(lot_id, None, 5, OfferStatus::Sold);

        let reconciliation = desk.ledgers.reconcile().unwrap();
        let kpis = reconciliation.kpis(Party::Seller(seller));

        assert_eq!(kpis.sales_count, 1);
        assert_eq!(kpis.sold_revenue, 14_000);
        // (7_000 - 5_000) * 2
        assert_eq!(kpis.profit, 4_000);
    }

    #[test]
    fn unrelated_seller_sees_nothing() {
        let mut desk = Desk::new();
        let lot_id = desk.lot(30);
        let delegation = desk.delegate(lot_id, SellerId::new(), 10);
        desk.offer_in(lot_id, Some(delegation), 2, OfferStatus::Active);
        desk.offer_in(lot_id, None, 2, OfferStatus::Sold);

        let kpis = desk
            .ledgers
            .reconcile()
            .unwrap()
            .kpis(Party::Seller(SellerId::new()));

        assert_eq!(kpis, Default::default());
    }

    #[test]
    fn seller_profit_survives_revocation() {
        let mut desk = Desk::new();
        let lot_id = desk.lot(30);
        let seller = SellerId::new();
        let delegation = desk.delegate(lot_id, seller, 10);
        desk.offer_in(lot_id, Some(delegation), 2, OfferStatus::Sold);
        desk.ledgers
            .revoke_delegation(desk.tenant_id, delegation, desk.now)
            .unwrap();

        let kpis = desk.ledgers.reconcile().unwrap().kpis(Party::Seller(seller));

        assert_eq!(kpis.sales_count, 1);
        assert_eq!(kpis.profit, 4_000);
    }
}
