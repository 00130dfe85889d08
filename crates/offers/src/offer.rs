use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stonetrade_core::{
    Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, Party, SellerId, TenantId,
    ValueObject,
};
use stonetrade_delegations::{AllocationClaim, DelegationId};
use stonetrade_events::Event;
use stonetrade_lots::LotId;

use crate::status::{OfferStatus, OfferTransition};

/// Offer identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub AggregateId);

impl OfferId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl From<OfferId> for AggregateId {
    fn from(value: OfferId) -> Self {
        value.0
    }
}

impl core::fmt::Display for OfferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Client-facing access token for an offer link.
///
/// Random (UUIDv4), unlike ids which are time-ordered, so links cannot be
/// guessed from neighbouring offers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(Uuid);

impl AccessToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.as_simple(), f)
    }
}

/// One engagement event in an offer's view log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferView {
    pub viewed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ValueObject for OfferView {}

/// Aggregate root: Offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    id: OfferId,
    tenant_id: Option<TenantId>,
    lot_id: LotId,
    delegation_id: Option<DelegationId>,
    /// Seller attribution captured at placement; survives delegation revocation.
    seller_id: Option<SellerId>,
    client_id: ClientId,
    client_name: String,
    /// Unit price in smallest currency unit.
    final_price: u64,
    quantity_offered: u64,
    /// Applicable floor unit price at placement.
    floor_price: u64,
    status: OfferStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    views: Vec<OfferView>,
    access_token: AccessToken,
    version: u64,
    created: bool,
}

impl Offer {
    /// Create an empty, not-yet-placed aggregate instance for rehydration.
    pub fn empty(id: OfferId) -> Self {
        Self {
            id,
            tenant_id: None,
            lot_id: LotId::new(AggregateId::from_uuid(Uuid::nil())),
            delegation_id: None,
            seller_id: None,
            client_id: ClientId::from_uuid(Uuid::nil()),
            client_name: String::new(),
            final_price: 0,
            quantity_offered: 0,
            floor_price: 0,
            status: OfferStatus::Active,
            created_at: DateTime::<Utc>::default(),
            expires_at: DateTime::<Utc>::default(),
            views: Vec::new(),
            access_token: AccessToken::from_uuid(Uuid::nil()),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OfferId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn delegation_id(&self) -> Option<DelegationId> {
        self.delegation_id
    }

    pub fn seller_id(&self) -> Option<SellerId> {
        self.seller_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn final_price(&self) -> u64 {
        self.final_price
    }

    pub fn quantity_offered(&self) -> u64 {
        self.quantity_offered
    }

    pub fn floor_price(&self) -> u64 {
        self.floor_price
    }

    pub fn status(&self) -> OfferStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn views(&self) -> &[OfferView] {
        &self.views
    }

    pub fn access_token(&self) -> AccessToken {
        self.access_token
    }

    pub fn is_placed(&self) -> bool {
        self.created
    }

    /// Party that originated the offer (and receives sale confirmations).
    pub fn originator(&self) -> Party {
        match self.seller_id {
            Some(seller_id) => Party::Seller(seller_id),
            None => Party::Industry,
        }
    }

    /// `final_price × quantity_offered`, widened so it cannot overflow.
    pub fn gross_value(&self) -> u128 {
        u128::from(self.final_price) * u128::from(self.quantity_offered)
    }

    /// Whether the offer's expiry has passed while it is still an open proposal.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            OfferStatus::Active | OfferStatus::ReservationPending
        ) && self.expires_at <= now
    }
}

impl AggregateRoot for Offer {
    type Id = OfferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl AllocationClaim for Offer {
    fn delegation_id(&self) -> Option<DelegationId> {
        self.delegation_id
    }

    fn claimed_quantity(&self) -> u64 {
        match self.status {
            OfferStatus::Expired => 0,
            _ => self.quantity_offered,
        }
    }

    fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Command: PlaceOffer.
///
/// Attribution (`seller_id`, `floor_price`) and the access token are resolved
/// by the caller from the ledgers; the aggregate only validates the terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOffer {
    pub tenant_id: TenantId,
    pub offer_id: OfferId,
    pub lot_id: LotId,
    pub delegation_id: Option<DelegationId>,
    pub seller_id: Option<SellerId>,
    pub client_id: ClientId,
    pub client_name: String,
    pub final_price: u64,
    pub quantity: u64,
    pub floor_price: u64,
    pub access_token: AccessToken,
    pub occurred_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Command: AdvanceOffer (one lifecycle transition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOffer {
    pub tenant_id: TenantId,
    pub offer_id: OfferId,
    pub transition: OfferTransition,
    pub actor: Party,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordView.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub tenant_id: TenantId,
    pub offer_id: OfferId,
    pub duration_ms: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferCommand {
    PlaceOffer(PlaceOffer),
    AdvanceOffer(AdvanceOffer),
    RecordView(RecordView),
}

/// Event: OfferPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferPlaced {
    pub tenant_id: TenantId,
    pub offer_id: OfferId,
    pub lot_id: LotId,
    pub delegation_id: Option<DelegationId>,
    pub seller_id: Option<SellerId>,
    pub client_id: ClientId,
    pub client_name: String,
    pub final_price: u64,
    pub quantity: u64,
    pub floor_price: u64,
    pub access_token: AccessToken,
    pub occurred_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Event: OfferStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferStatusChanged {
    pub tenant_id: TenantId,
    pub offer_id: OfferId,
    pub lot_id: LotId,
    pub transition: OfferTransition,
    pub from: OfferStatus,
    pub to: OfferStatus,
    pub actor: Party,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OfferViewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferViewed {
    pub tenant_id: TenantId,
    pub offer_id: OfferId,
    pub duration_ms: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferEvent {
    OfferPlaced(OfferPlaced),
    OfferStatusChanged(OfferStatusChanged),
    OfferViewed(OfferViewed),
}

impl OfferEvent {
    pub fn offer_id(&self) -> OfferId {
        match self {
            OfferEvent::OfferPlaced(e) => e.offer_id,
            OfferEvent::OfferStatusChanged(e) => e.offer_id,
            OfferEvent::OfferViewed(e) => e.offer_id,
        }
    }
}

impl Event for OfferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OfferEvent::OfferPlaced(_) => "offers.offer.placed",
            OfferEvent::OfferStatusChanged(_) => "offers.offer.status_changed",
            OfferEvent::OfferViewed(_) => "offers.offer.viewed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OfferEvent::OfferPlaced(e) => e.occurred_at,
            OfferEvent::OfferStatusChanged(e) => e.occurred_at,
            OfferEvent::OfferViewed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Offer {
    type Command = OfferCommand;
    type Event = OfferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OfferEvent::OfferPlaced(e) => {
                self.id = e.offer_id;
                self.tenant_id = Some(e.tenant_id);
                self.lot_id = e.lot_id;
                self.delegation_id = e.delegation_id;
                self.seller_id = e.seller_id;
                self.client_id = e.client_id;
                self.client_name = e.client_name.clone();
                self.final_price = e.final_price;
                self.quantity_offered = e.quantity;
                self.floor_price = e.floor_price;
                self.status = OfferStatus::Active;
                self.created_at = e.occurred_at;
                self.expires_at = e.expires_at;
                self.views.clear();
                self.access_token = e.access_token;
                self.created = true;
            }
            OfferEvent::OfferStatusChanged(e) => {
                self.status = e.to;
            }
            OfferEvent::OfferViewed(e) => {
                self.views.push(OfferView {
                    viewed_at: e.occurred_at,
                    duration_ms: e.duration_ms,
                });
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OfferCommand::PlaceOffer(cmd) => self.handle_place(cmd),
            OfferCommand::AdvanceOffer(cmd) => self.handle_advance(cmd),
            OfferCommand::RecordView(cmd) => self.handle_record_view(cmd),
        }
    }
}

impl Offer {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    fn ensure_offer_id(&self, offer_id: OfferId) -> Result<(), DomainError> {
        if self.id != offer_id {
            return Err(DomainError::invariant("offer_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOffer) -> Result<Vec<OfferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("offer already exists"));
        }
        self.ensure_offer_id(cmd.offer_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.client_name.trim().is_empty() {
            return Err(DomainError::validation("client name cannot be empty"));
        }
        if cmd.expires_at <= cmd.occurred_at {
            return Err(DomainError::validation("offer must expire after it is placed"));
        }
        if cmd.delegation_id.is_some() != cmd.seller_id.is_some() {
            return Err(DomainError::invariant(
                "delegated offers need a seller and direct offers must not have one",
            ));
        }

        Ok(vec![OfferEvent::OfferPlaced(OfferPlaced {
            tenant_id: cmd.tenant_id,
            offer_id: cmd.offer_id,
            lot_id: cmd.lot_id,
            delegation_id: cmd.delegation_id,
            seller_id: cmd.seller_id,
            client_id: cmd.client_id,
            client_name: cmd.client_name.trim().to_string(),
            final_price: cmd.final_price,
            quantity: cmd.quantity,
            floor_price: cmd.floor_price,
            access_token: cmd.access_token,
            occurred_at: cmd.occurred_at,
            expires_at: cmd.expires_at,
        })])
    }

    fn handle_advance(&self, cmd: &AdvanceOffer) -> Result<Vec<OfferEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_offer_id(cmd.offer_id)?;

        let to = self
            .status
            .next(cmd.transition)
            .ok_or_else(|| DomainError::IllegalTransition {
                offer_id: self.id.0,
                from: self.status.as_str(),
                event: cmd.transition.as_str(),
            })?;

        if cmd.transition.requires_authority() && !cmd.actor.is_authority() {
            return Err(DomainError::Unauthorized);
        }
        if let Party::Seller(seller_id) = cmd.actor {
            if self.seller_id != Some(seller_id) {
                return Err(DomainError::Unauthorized);
            }
        }

        Ok(vec![OfferEvent::OfferStatusChanged(OfferStatusChanged {
            tenant_id: cmd.tenant_id,
            offer_id: cmd.offer_id,
            lot_id: self.lot_id,
            transition: cmd.transition,
            from: self.status,
            to,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_view(&self, cmd: &RecordView) -> Result<Vec<OfferEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_offer_id(cmd.offer_id)?;

        Ok(vec![OfferEvent::OfferViewed(OfferViewed {
            tenant_id: cmd.tenant_id,
            offer_id: cmd.offer_id,
            duration_ms: cmd.duration_ms,
            occurred_at: cmd.occurred_at,
        })])
    }
}
