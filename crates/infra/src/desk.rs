//! Trading desk: the transactional entry point for every ledger mutation.
//!
//! Each mutation runs the same pipeline:
//!
//! ```text
//! load tenant ledgers + version
//!   ↓
//! clone into a working copy and apply the mutation (validate, then apply)
//!   ↓
//! strict reconciliation of the working copy (a fault aborts here)
//!   ↓
//! commit with ExpectedVersion::Exact(version)
//!   ↓
//! publish events, then the fresh snapshots
//! ```
//!
//! Nothing is published unless the commit succeeded. A stale version fails
//! with [`DeskError::Conflict`] and is never retried here. View logging has
//! no precondition and is applied under the store lock to the latest state
//! instead, so it never conflicts. A publication
//! failure after commit is reported as [`DeskError::Publish`]; the commit
//! stands.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use stonetrade_core::{
    AggregateId, ClientId, DomainError, DomainResult, ExpectedVersion, Party, SellerId, TenantId,
};
use stonetrade_delegations::{AllocateStock, Delegation, DelegationId};
use stonetrade_events::{EventBus, Subscription};
use stonetrade_lots::{Lot, LotId, RegisterLot};
use stonetrade_offers::{AccessToken, AdvanceOffer, Offer, OfferId, OfferTransition, RecordView};
use stonetrade_reconciliation::{
    Applied, LedgerEvent, Ledgers, OfferRequest, PlacedOffer, QuantitySnapshot, Reconciliation,
    SalesKpis,
};

use crate::config::DeskConfig;
use crate::ledger_store::{LedgerStore, LedgerStoreError, StoredEvent, UncommittedEvent};
use crate::messages::{DeskMessage, SaleConfirmed, SnapshotPublished};

#[derive(Debug, Error)]
pub enum DeskError {
    /// Business rule violation; nothing was committed.
    #[error(transparent)]
    Domain(DomainError),

    /// The tenant's ledgers moved on since they were loaded.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("ledger store failure: {0}")]
    Store(LedgerStoreError),

    /// Publication failed after a successful commit.
    #[error("publication failed after commit: {0}")]
    Publish(String),
}

impl DeskError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            DeskError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DomainError> for DeskError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => DeskError::Conflict(msg),
            other => DeskError::Domain(other),
        }
    }
}

impl From<LedgerStoreError> for DeskError {
    fn from(value: LedgerStoreError) -> Self {
        match value {
            LedgerStoreError::Concurrency(msg) => DeskError::Conflict(msg),
            other => DeskError::Store(other),
        }
    }
}

/// Input for [`TradeDesk::create_offer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    pub lot_id: LotId,
    /// `None` for a direct industry sale.
    pub delegation_id: Option<DelegationId>,
    pub client_id: ClientId,
    pub client_name: String,
    /// Unit price in smallest currency unit.
    pub final_price: u64,
    pub quantity: u64,
}

/// Read-side view of a tenant for one viewer.
#[derive(Debug, Clone)]
pub struct TenantView {
    pub ledger_version: u64,
    pub viewer: Party,
    pub reconciliation: Reconciliation,
    pub kpis: SalesKpis,
}

/// Result of a successful commit.
struct Committed<T> {
    value: T,
    ledger_version: u64,
}

#[derive(Debug)]
pub struct TradeDesk<S, B> {
    store: S,
    bus: B,
    config: DeskConfig,
}

impl<S, B> TradeDesk<S, B> {
    pub fn new(store: S, bus: B, config: DeskConfig) -> Self {
        Self { store, bus, config }
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> TradeDesk<S, B>
where
    S: LedgerStore,
    B: EventBus<DeskMessage>,
{
    pub fn subscribe(&self) -> Subscription<DeskMessage> {
        self.bus.subscribe()
    }

    /// Batch intake of a new lot.
    pub fn register_lot(
        &self,
        tenant_id: TenantId,
        code: impl Into<String>,
        total: u64,
        base_cost: u64,
        floor_price: u64,
    ) -> Result<Lot, DeskError> {
        let cmd = RegisterLot {
            tenant_id,
            lot_id: LotId::new(AggregateId::new()),
            code: code.into(),
            total,
            base_cost,
            floor_price,
            occurred_at: Utc::now(),
        };

        let committed = self.transact(tenant_id, "register_lot", |ledgers| ledgers.register_lot(cmd))?;
        tracing::info!(
            %tenant_id,
            lot_id = %committed.value.id_typed(),
            total,
            ledger_version = committed.ledger_version,
            "lot registered"
        );
        Ok(committed.value)
    }

    pub fn create_delegation(
        &self,
        tenant_id: TenantId,
        lot_id: LotId,
        seller_id: SellerId,
        quantity: u64,
        agreed_min_price: u64,
    ) -> Result<Delegation, DeskError> {
        let cmd = AllocateStock {
            tenant_id,
            delegation_id: DelegationId::new(AggregateId::new()),
            lot_id,
            seller_id,
            quantity,
            agreed_min_price,
            occurred_at: Utc::now(),
        };

        let committed =
            self.transact(tenant_id, "create_delegation", |ledgers| ledgers.create_delegation(&cmd))?;
        tracing::info!(
            %tenant_id,
            %lot_id,
            delegation_id = %committed.value.id_typed(),
            %seller_id,
            quantity,
            ledger_version = committed.ledger_version,
            "delegation created"
        );
        Ok(committed.value)
    }

    pub fn revoke_delegation(&self, tenant_id: TenantId, delegation_id: DelegationId) -> Result<(), DeskError> {
        let now = Utc::now();
        self.transact(tenant_id, "revoke_delegation", |ledgers| {
            ledgers.revoke_delegation(tenant_id, delegation_id, now)
        })?;
        tracing::info!(%tenant_id, %delegation_id, "delegation revoked");
        Ok(())
    }

    /// Place a direct or delegated offer.
    ///
    /// Under the `warn` floor-price policy an under-floor offer is accepted
    /// and the warning is both logged and returned.
    pub fn create_offer(&self, tenant_id: TenantId, new_offer: NewOffer) -> Result<PlacedOffer, DeskError> {
        let now = Utc::now();
        let request = OfferRequest {
            tenant_id,
            offer_id: OfferId::new(AggregateId::new()),
            lot_id: new_offer.lot_id,
            delegation_id: new_offer.delegation_id,
            client_id: new_offer.client_id,
            client_name: new_offer.client_name,
            final_price: new_offer.final_price,
            quantity: new_offer.quantity,
            access_token: AccessToken::generate(),
            occurred_at: now,
            expires_at: now + self.config.offer_ttl,
        };
        let policy = self.config.floor_price_policy;

        let committed = self.transact(tenant_id, "create_offer", |ledgers| {
            ledgers.place_offer(request, policy)
        })?;
        let ledger_version = committed.ledger_version;
        let placed = committed.value;

        if let Some(warning) = &placed.floor_warning {
            tracing::warn!(
                %tenant_id,
                offer_id = %warning.offer_id,
                floor_price = warning.floor_price,
                final_price = warning.final_price,
                "offer priced below floor"
            );
        }
        tracing::info!(
            %tenant_id,
            offer_id = %placed.offer.id_typed(),
            lot_id = %placed.offer.lot_id(),
            quantity = placed.offer.quantity_offered(),
            ledger_version,
            "offer placed"
        );
        Ok(placed)
    }

    pub fn request_reservation(&self, tenant_id: TenantId, offer_id: OfferId, actor: Party) -> Result<Offer, DeskError> {
        self.advance(tenant_id, offer_id, OfferTransition::RequestReservation, actor)
    }

    pub fn approve_reservation(&self, tenant_id: TenantId, offer_id: OfferId, actor: Party) -> Result<Offer, DeskError> {
        self.advance(tenant_id, offer_id, OfferTransition::ApproveReservation, actor)
    }

    pub fn reject_reservation(&self, tenant_id: TenantId, offer_id: OfferId, actor: Party) -> Result<Offer, DeskError> {
        self.advance(tenant_id, offer_id, OfferTransition::RejectReservation, actor)
    }

    /// Finalize a sale and notify the party that originated the offer.
    pub fn finalize_sale(&self, tenant_id: TenantId, offer_id: OfferId, actor: Party) -> Result<Offer, DeskError> {
        let offer = self.advance(tenant_id, offer_id, OfferTransition::FinalizeSale, actor)?;

        let confirmation = SaleConfirmed::for_offer(tenant_id, &offer, Utc::now());
        self.publish(DeskMessage::SaleConfirmed(confirmation))?;
        Ok(offer)
    }

    pub fn cancel_offer(&self, tenant_id: TenantId, offer_id: OfferId, actor: Party) -> Result<Offer, DeskError> {
        self.advance(tenant_id, offer_id, OfferTransition::Cancel, actor)
    }

    /// Run one lifecycle transition.
    pub fn advance(
        &self,
        tenant_id: TenantId,
        offer_id: OfferId,
        transition: OfferTransition,
        actor: Party,
    ) -> Result<Offer, DeskError> {
        let cmd = AdvanceOffer {
            tenant_id,
            offer_id,
            transition,
            actor,
            occurred_at: Utc::now(),
        };

        let committed = self.transact(tenant_id, transition.as_str(), |ledgers| ledgers.advance_offer(cmd))?;
        tracing::info!(
            %tenant_id,
            %offer_id,
            transition = transition.as_str(),
            status = %committed.value.status(),
            ledger_version = committed.ledger_version,
            "offer advanced"
        );
        Ok(committed.value)
    }

    /// Append an engagement event; never changes the offer's status.
    ///
    /// Concurrent writes to the tenant do not make this fail.
    pub fn record_view(&self, tenant_id: TenantId, offer_id: OfferId, duration_ms: u64) -> Result<Offer, DeskError> {
        let cmd = RecordView {
            tenant_id,
            offer_id,
            duration_ms,
            occurred_at: Utc::now(),
        };

        let ((offer, snapshots), committed) = self
            .store
            .append_with(tenant_id, |ledgers| -> Result<_, DeskError> {
                let applied = ledgers.record_view(cmd)?;
                let snapshots: Vec<QuantitySnapshot> =
                    ledgers.reconcile()?.snapshots().copied().collect();
                let events = uncommitted(tenant_id, &applied.events)?;
                Ok(((applied.value, snapshots), events))
            })
            .inspect_err(|e| {
                tracing::warn!(%tenant_id, %offer_id, error = %e, "view not recorded");
            })?;

        self.publish_commit(tenant_id, &committed, snapshots)?;
        Ok(offer)
    }

    /// Cancel every open proposal of the tenant whose expiry is at or before `now`.
    pub fn sweep_expired(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<Vec<Offer>, DeskError> {
        let committed = self.transact(tenant_id, "sweep_expired", |ledgers| {
            ledgers.expire_overdue(tenant_id, now)
        })?;
        if !committed.value.is_empty() {
            tracing::info!(%tenant_id, expired = committed.value.len(), "overdue offers expired");
        }
        Ok(committed.value)
    }

    /// Reconcile the committed state for `viewer`.
    ///
    /// Uses the display pass, so faults are logged and reported on the
    /// result instead of failing the read.
    pub fn reconcile(&self, tenant_id: TenantId, viewer: Party) -> Result<TenantView, DeskError> {
        let state = self.store.load(tenant_id)?;
        let reconciliation = state.ledgers.reconcile_for_display();
        let kpis = reconciliation.kpis(viewer);

        Ok(TenantView {
            ledger_version: state.version,
            viewer,
            reconciliation,
            kpis,
        })
    }

    /// Committed ledgers of a tenant (a consistent copy).
    pub fn ledgers(&self, tenant_id: TenantId) -> Result<Ledgers, DeskError> {
        Ok(self.store.load(tenant_id)?.ledgers)
    }

    /// The tenant's committed event journal.
    pub fn journal(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, DeskError> {
        Ok(self.store.events(tenant_id)?)
    }

    fn transact<T>(
        &self,
        tenant_id: TenantId,
        operation: &str,
        mutate: impl FnOnce(&mut Ledgers) -> DomainResult<Applied<T>>,
    ) -> Result<Committed<T>, DeskError> {
        let state = self.store.load(tenant_id)?;
        let mut working = state.ledgers;

        let applied = mutate(&mut working).inspect_err(|e| {
            tracing::warn!(%tenant_id, operation, error = %e, "mutation rejected");
        })?;
        if applied.events.is_empty() {
            return Ok(Committed {
                value: applied.value,
                ledger_version: state.version,
            });
        }

        let reconciliation = working.reconcile().inspect_err(|e| {
            tracing::error!(%tenant_id, operation, error = %e, "mutation would break reconciliation");
        })?;

        let events = uncommitted(tenant_id, &applied.events)?;

        let committed = self
            .store
            .commit(tenant_id, ExpectedVersion::Exact(state.version), working, events)
            .inspect_err(|e| {
                tracing::warn!(%tenant_id, operation, error = %e, "commit failed");
            })?;
        let ledger_version = self.publish_commit(
            tenant_id,
            &committed,
            reconciliation.snapshots().copied().collect(),
        )?;

        Ok(Committed {
            value: applied.value,
            ledger_version,
        })
    }

    /// Publish committed events followed by the snapshots they produced.
    /// Returns the new ledger version.
    fn publish_commit(
        &self,
        tenant_id: TenantId,
        committed: &[StoredEvent],
        snapshots: Vec<QuantitySnapshot>,
    ) -> Result<u64, DeskError> {
        let ledger_version = committed
            .last()
            .map(|e| e.sequence_number)
            .unwrap_or_default();

        for stored in committed {
            self.publish(DeskMessage::Event(stored.to_envelope()))?;
        }
        self.publish(DeskMessage::SnapshotPublished(SnapshotPublished {
            tenant_id,
            ledger_version,
            snapshots,
        }))?;
        Ok(ledger_version)
    }

    fn publish(&self, message: DeskMessage) -> Result<(), DeskError> {
        self.bus
            .publish(message)
            .map_err(|e| DeskError::Publish(format!("{e:?}")))
    }
}

fn uncommitted(tenant_id: TenantId, events: &[LedgerEvent]) -> Result<Vec<UncommittedEvent>, DeskError> {
    events
        .iter()
        .map(|ev| UncommittedEvent::from_typed(tenant_id, Uuid::now_v7(), ev))
        .collect::<Result<Vec<_>, _>>()
        .map_err(DeskError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stonetrade_events::InMemoryEventBus;
    use stonetrade_offers::OfferStatus;

    use crate::ledger_store::InMemoryLedgerStore;

    type TestDesk = TradeDesk<Arc<InMemoryLedgerStore>, Arc<InMemoryEventBus<DeskMessage>>>;

    fn desk_with(config: DeskConfig) -> TestDesk {
        TradeDesk::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryEventBus::new()),
            config,
        )
    }

    fn desk() -> TestDesk {
        desk_with(DeskConfig::default())
    }

    fn new_offer(lot_id: LotId, quantity: u64) -> NewOffer {
        NewOffer {
            lot_id,
            delegation_id: None,
            client_id: ClientId::new(),
            client_name: "Granitos Reunidos".to_string(),
            final_price: 9_000,
            quantity,
        }
    }

    #[test]
    fn every_commit_publishes_events_then_a_snapshot() {
        let desk = desk();
        let subscription = desk.subscribe();
        let tenant_id = TenantId::new();

        let lot = desk.register_lot(tenant_id, "QTZ-1", 30, 5_000, 8_000).unwrap();

        let messages = subscription.drain();
        assert_eq!(messages.len(), 2);
        let envelope = messages[0].as_event().unwrap();
        assert_eq!(envelope.event_type(), "lots.lot.registered");
        assert_eq!(envelope.ledger_version(), 1);
        match &messages[1] {
            DeskMessage::SnapshotPublished(published) => {
                assert_eq!(published.ledger_version, 1);
                assert_eq!(published.snapshots[0].lot_id, lot.id_typed());
                assert_eq!(published.snapshots[0].available, 30);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn rejected_mutation_publishes_nothing() {
        let desk = desk();
        let tenant_id = TenantId::new();
        let lot = desk.register_lot(tenant_id, "QTZ-1", 10, 5_000, 8_000).unwrap();
        let subscription = desk.subscribe();

        let err = desk
            .create_offer(tenant_id, new_offer(lot.id_typed(), 11))
            .unwrap_err();

        assert_eq!(
            err.as_domain(),
            Some(&DomainError::insufficient_stock(lot.id_typed(), 11, 10))
        );
        assert!(subscription.drain().is_empty());
        assert_eq!(desk.journal(tenant_id).unwrap().len(), 1);
    }

    #[test]
    fn offers_expire_after_configured_ttl() {
        let desk = desk_with(DeskConfig {
            offer_ttl: chrono::Duration::days(3),
            ..DeskConfig::default()
        });
        let tenant_id = TenantId::new();
        let lot = desk.register_lot(tenant_id, "QTZ-1", 10, 5_000, 8_000).unwrap();

        let placed = desk.create_offer(tenant_id, new_offer(lot.id_typed(), 2)).unwrap();
        let offer = placed.offer;

        assert_eq!(offer.expires_at() - offer.created_at(), chrono::Duration::days(3));
    }

    #[test]
    fn finalize_sale_notifies_the_originator() {
        let desk = desk();
        let tenant_id = TenantId::new();
        let seller = SellerId::new();
        let lot = desk.register_lot(tenant_id, "QTZ-1", 10, 5_000, 8_000).unwrap();
        let delegation = desk
            .create_delegation(tenant_id, lot.id_typed(), seller, 5, 7_000)
            .unwrap();
        let mut request = new_offer(lot.id_typed(), 2);
        request.delegation_id = Some(delegation.id_typed());
        let offer = desk.create_offer(tenant_id, request).unwrap().offer;
        let subscription = desk.subscribe();

        desk.finalize_sale(tenant_id, offer.id_typed(), Party::Seller(seller))
            .unwrap();

        let confirmation = subscription
            .drain()
            .into_iter()
            .find_map(|m| match m {
                DeskMessage::SaleConfirmed(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(confirmation.recipient, Party::Seller(seller));
        assert_eq!(confirmation.quantity, 2);
    }

    #[test]
    fn sweep_with_nothing_overdue_commits_nothing() {
        let desk = desk();
        let tenant_id = TenantId::new();
        let lot = desk.register_lot(tenant_id, "QTZ-1", 10, 5_000, 8_000).unwrap();
        desk.create_offer(tenant_id, new_offer(lot.id_typed(), 2)).unwrap();
        let version = desk.reconcile(tenant_id, Party::Industry).unwrap().ledger_version;

        let expired = desk.sweep_expired(tenant_id, Utc::now()).unwrap();

        assert!(expired.is_empty());
        assert_eq!(desk.reconcile(tenant_id, Party::Industry).unwrap().ledger_version, version);
    }

    #[test]
    fn sweep_cancels_overdue_offers() {
        let desk = desk();
        let tenant_id = TenantId::new();
        let lot = desk.register_lot(tenant_id, "QTZ-1", 10, 5_000, 8_000).unwrap();
        let offer = desk.create_offer(tenant_id, new_offer(lot.id_typed(), 4)).unwrap().offer;

        let expired = desk
            .sweep_expired(tenant_id, offer.expires_at())
            .unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status(), OfferStatus::Expired);
        let view = desk.reconcile(tenant_id, Party::Industry).unwrap();
        assert_eq!(view.reconciliation.snapshot(&lot.id_typed()).unwrap().available, 10);
    }

    #[test]
    fn record_view_publishes_like_any_commit() {
        let desk = desk();
        let tenant_id = TenantId::new();
        let lot = desk.register_lot(tenant_id, "QTZ-1", 10, 5_000, 8_000).unwrap();
        let offer = desk.create_offer(tenant_id, new_offer(lot.id_typed(), 2)).unwrap().offer;
        let subscription = desk.subscribe();

        let viewed = desk.record_view(tenant_id, offer.id_typed(), 1_500).unwrap();

        assert_eq!(viewed.views().len(), 1);
        assert_eq!(viewed.status(), OfferStatus::Active);
        let messages = subscription.drain();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].as_event().unwrap().event_type(), "offers.offer.viewed");
        assert!(matches!(
            &messages[1],
            DeskMessage::SnapshotPublished(p) if p.ledger_version == 3
        ));
    }

    #[test]
    fn record_view_of_unknown_offer_commits_nothing() {
        let desk = desk();
        let tenant_id = TenantId::new();
        desk.register_lot(tenant_id, "QTZ-1", 10, 5_000, 8_000).unwrap();

        let err = desk
            .record_view(tenant_id, OfferId::new(AggregateId::new()), 10)
            .unwrap_err();

        assert_eq!(err.as_domain(), Some(&DomainError::NotFound));
        assert_eq!(desk.journal(tenant_id).unwrap().len(), 1);
    }

    #[test]
    fn store_conflict_maps_to_desk_conflict() {
        let err: DeskError = LedgerStoreError::Concurrency("expected 1, found 2".to_string()).into();
        assert!(matches!(err, DeskError::Conflict(_)));

        let err: DeskError = DomainError::conflict("offer already exists").into();
        assert!(matches!(err, DeskError::Conflict(_)));
    }
}
