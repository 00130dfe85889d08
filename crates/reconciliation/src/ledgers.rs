//! The three ledgers of one tenant and every mutation on them.
//!
//! Each mutation validates against the current state first and only then
//! applies, so an `Err` leaves the ledgers untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stonetrade_core::{AggregateId, ClientId, DomainError, DomainResult, Entity, Party, TenantId};
use stonetrade_delegations::{AllocateStock, Delegation, DelegationEvent, DelegationId};
use stonetrade_events::{Event, execute};
use stonetrade_lots::{Lot, LotCommand, LotEvent, LotId, RegisterLot};
use stonetrade_offers::{
    AccessToken, AdvanceOffer, Offer, OfferCommand, OfferEvent, OfferId, OfferTransition,
    PlaceOffer, RecordView,
};

use crate::engine::{Reconciliation, lot_snapshot, reconcile, reconcile_for_display};
use crate::snapshot::QuantitySnapshot;

/// What to do with an offer priced under its floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorPricePolicy {
    /// Accept the offer and hand back a [`FloorPriceWarning`].
    #[default]
    Warn,
    /// Reject the offer with a validation error.
    Block,
}

/// Advisory returned with an offer priced below the applicable floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorPriceWarning {
    pub offer_id: OfferId,
    pub floor_price: u64,
    pub final_price: u64,
}

impl FloorPriceWarning {
    pub fn shortfall(&self) -> u64 {
        self.floor_price.saturating_sub(self.final_price)
    }
}

/// Input for placing an offer. Attribution and floor are resolved from the
/// ledgers, never taken from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRequest {
    pub tenant_id: TenantId,
    pub offer_id: OfferId,
    pub lot_id: LotId,
    pub delegation_id: Option<DelegationId>,
    pub client_id: ClientId,
    pub client_name: String,
    pub final_price: u64,
    pub quantity: u64,
    pub access_token: AccessToken,
    pub occurred_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOffer {
    pub offer: Offer,
    pub floor_warning: Option<FloorPriceWarning>,
}

/// A successful mutation: its result and the events it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<T> {
    pub value: T,
    pub events: Vec<LedgerEvent>,
}

/// Any event emitted by a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerEvent {
    Lot(LotEvent),
    Delegation(DelegationEvent),
    Offer(OfferEvent),
}

impl LedgerEvent {
    pub fn aggregate_id(&self) -> AggregateId {
        match self {
            LedgerEvent::Lot(LotEvent::LotRegistered(e)) => e.lot_id.0,
            LedgerEvent::Delegation(e) => e.delegation_id().0,
            LedgerEvent::Offer(e) => e.offer_id().0,
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            LedgerEvent::Lot(_) => "lots.lot",
            LedgerEvent::Delegation(_) => "delegations.delegation",
            LedgerEvent::Offer(_) => "offers.offer",
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Lot(e) => e.event_type(),
            LedgerEvent::Delegation(e) => e.event_type(),
            LedgerEvent::Offer(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            LedgerEvent::Lot(e) => e.version(),
            LedgerEvent::Delegation(e) => e.version(),
            LedgerEvent::Offer(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Lot(e) => e.occurred_at(),
            LedgerEvent::Delegation(e) => e.occurred_at(),
            LedgerEvent::Offer(e) => e.occurred_at(),
        }
    }
}

/// Lots, delegations and offers of one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledgers {
    lots: BTreeMap<LotId, Lot>,
    delegations: BTreeMap<DelegationId, Delegation>,
    offers: BTreeMap<OfferId, Offer>,
    /// Client link → offer; tokens never change once issued.
    tokens: BTreeMap<AccessToken, OfferId>,
}

impl Ledgers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.values()
    }

    pub fn delegations(&self) -> impl Iterator<Item = &Delegation> {
        self.delegations.values()
    }

    pub fn offers(&self) -> impl Iterator<Item = &Offer> {
        self.offers.values()
    }

    pub fn lot(&self, id: &LotId) -> Option<&Lot> {
        self.lots.get(id)
    }

    pub fn delegation(&self, id: &DelegationId) -> Option<&Delegation> {
        self.delegations.get(id)
    }

    pub fn offer(&self, id: &OfferId) -> Option<&Offer> {
        self.offers.get(id)
    }

    pub fn offer_by_token(&self, token: AccessToken) -> Option<&Offer> {
        self.tokens.get(&token).and_then(|id| self.offers.get(id))
    }

    pub fn offers_for_delegation(&self, id: DelegationId) -> impl Iterator<Item = &Offer> {
        self.offers
            .values()
            .filter(move |o| o.delegation_id() == Some(id))
    }

    pub fn reconcile(&self) -> DomainResult<Reconciliation> {
        reconcile(self.lots(), self.delegations(), self.offers())
    }

    pub fn reconcile_for_display(&self) -> Reconciliation {
        reconcile_for_display(self.lots(), self.delegations(), self.offers())
    }

    /// Fresh snapshot of one lot (strict).
    pub fn snapshot(&self, lot_id: LotId) -> DomainResult<QuantitySnapshot> {
        let lot = self.lots.get(&lot_id).ok_or(DomainError::NotFound)?;
        lot_snapshot(lot, self.offers.values())
    }

    fn lot_for(&self, tenant_id: TenantId, id: LotId) -> DomainResult<&Lot> {
        self.lots
            .get(&id)
            .filter(|l| l.tenant_id() == Some(tenant_id))
            .ok_or(DomainError::NotFound)
    }

    fn delegation_for(&self, tenant_id: TenantId, id: DelegationId) -> DomainResult<&Delegation> {
        self.delegations
            .get(&id)
            .filter(|d| d.tenant_id() == tenant_id)
            .ok_or(DomainError::NotFound)
    }

    pub fn register_lot(&mut self, cmd: RegisterLot) -> DomainResult<Applied<Lot>> {
        if self.lots.contains_key(&cmd.lot_id) {
            return Err(DomainError::conflict("lot already registered"));
        }

        let mut lot = Lot::empty(cmd.lot_id);
        let events = execute(&mut lot, &LotCommand::RegisterLot(cmd))?;
        self.lots.insert(lot.id_typed(), lot.clone());

        Ok(Applied {
            value: lot,
            events: events.into_iter().map(LedgerEvent::Lot).collect(),
        })
    }

    pub fn create_delegation(&mut self, cmd: &AllocateStock) -> DomainResult<Applied<Delegation>> {
        self.lot_for(cmd.tenant_id, cmd.lot_id)?;
        if self.delegations.contains_key(&cmd.delegation_id) {
            return Err(DomainError::conflict("delegation already exists"));
        }

        let available = self.snapshot(cmd.lot_id)?.available;
        let delegation = Delegation::allocate(cmd, available)?;
        let event = DelegationEvent::created(&delegation);
        self.delegations.insert(*delegation.id(), delegation.clone());

        Ok(Applied {
            value: delegation,
            events: vec![LedgerEvent::Delegation(event)],
        })
    }

    pub fn revoke_delegation(
        &mut self,
        tenant_id: TenantId,
        id: DelegationId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Applied<Delegation>> {
        self.delegation_for(tenant_id, id)?
            .ensure_revocable(self.offers.values())?;

        let delegation = self.delegations.remove(&id).ok_or(DomainError::NotFound)?;
        let event = DelegationEvent::revoked(&delegation, occurred_at);

        Ok(Applied {
            value: delegation,
            events: vec![LedgerEvent::Delegation(event)],
        })
    }

    pub fn place_offer(
        &mut self,
        request: OfferRequest,
        policy: FloorPricePolicy,
    ) -> DomainResult<Applied<PlacedOffer>> {
        if request.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if request.client_name.trim().is_empty() {
            return Err(DomainError::validation("client name cannot be empty"));
        }

        let lot = self.lot_for(request.tenant_id, request.lot_id)?;
        let delegation = match request.delegation_id {
            Some(id) => {
                let delegation = self.delegation_for(request.tenant_id, id)?;
                if delegation.lot_id() != request.lot_id {
                    return Err(DomainError::validation("delegation belongs to a different lot"));
                }
                Some(delegation)
            }
            None => None,
        };

        if self.offers.contains_key(&request.offer_id) {
            return Err(DomainError::conflict("offer already exists"));
        }
        if self.offer_by_token(request.access_token).is_some() {
            return Err(DomainError::conflict("access token already issued"));
        }

        let available = self.snapshot(request.lot_id)?.available;
        if request.quantity > available {
            return Err(DomainError::insufficient_stock(request.lot_id, request.quantity, available));
        }
        if let Some(delegation) = delegation {
            let remaining = delegation.remaining_net_quantity(self.offers.values());
            if request.quantity > remaining {
                return Err(DomainError::insufficient_delegated_stock(
                    request.lot_id,
                    delegation.id_typed(),
                    request.quantity,
                    remaining,
                ));
            }
        }

        let floor_price = delegation
            .map(Delegation::agreed_min_price)
            .unwrap_or_else(|| lot.floor_price());
        let floor_warning = if request.final_price < floor_price {
            match policy {
                FloorPricePolicy::Warn => Some(FloorPriceWarning {
                    offer_id: request.offer_id,
                    floor_price,
                    final_price: request.final_price,
                }),
                FloorPricePolicy::Block => {
                    return Err(DomainError::validation(format!(
                        "price {} is below the floor of {floor_price}",
                        request.final_price
                    )));
                }
            }
        } else {
            None
        };

        let cmd = PlaceOffer {
            tenant_id: request.tenant_id,
            offer_id: request.offer_id,
            lot_id: request.lot_id,
            delegation_id: request.delegation_id,
            seller_id: delegation.map(Delegation::seller_id),
            client_id: request.client_id,
            client_name: request.client_name,
            final_price: request.final_price,
            quantity: request.quantity,
            floor_price,
            access_token: request.access_token,
            occurred_at: request.occurred_at,
            expires_at: request.expires_at,
        };

        let mut offer = Offer::empty(cmd.offer_id);
        let events = execute(&mut offer, &OfferCommand::PlaceOffer(cmd))?;
        self.offers.insert(offer.id_typed(), offer.clone());
        self.tokens.insert(offer.access_token(), offer.id_typed());

        Ok(Applied {
            value: PlacedOffer { offer, floor_warning },
            events: events.into_iter().map(LedgerEvent::Offer).collect(),
        })
    }

    pub fn advance_offer(&mut self, cmd: AdvanceOffer) -> DomainResult<Applied<Offer>> {
        self.run_offer(cmd.offer_id, OfferCommand::AdvanceOffer(cmd))
    }

    pub fn record_view(&mut self, cmd: RecordView) -> DomainResult<Applied<Offer>> {
        self.run_offer(cmd.offer_id, OfferCommand::RecordView(cmd))
    }

    /// Cancel every open proposal of `tenant_id` whose expiry is at or before
    /// `now`. Approved reservations are left alone.
    pub fn expire_overdue(
        &mut self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> DomainResult<Applied<Vec<Offer>>> {
        let overdue: Vec<OfferId> = self
            .offers
            .values()
            .filter(|o| o.tenant_id() == Some(tenant_id) && o.is_overdue(now))
            .map(Offer::id_typed)
            .collect();

        let mut working = self.clone();
        let mut expired = Vec::with_capacity(overdue.len());
        let mut events = Vec::new();
        for offer_id in overdue {
            let applied = working.advance_offer(AdvanceOffer {
                tenant_id,
                offer_id,
                transition: OfferTransition::Cancel,
                actor: Party::Industry,
                occurred_at: now,
            })?;
            expired.push(applied.value);
            events.extend(applied.events);
        }
        *self = working;

        Ok(Applied {
            value: expired,
            events,
        })
    }

    fn run_offer(&mut self, offer_id: OfferId, cmd: OfferCommand) -> DomainResult<Applied<Offer>> {
        let mut offer = self.offers.get(&offer_id).cloned().ok_or(DomainError::NotFound)?;
        let events = execute(&mut offer, &cmd)?;
        self.offers.insert(offer_id, offer.clone());

        Ok(Applied {
            value: offer,
            events: events.into_iter().map(LedgerEvent::Offer).collect(),
        })
    }
}
