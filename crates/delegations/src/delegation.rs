use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stonetrade_core::{AggregateId, DomainError, DomainResult, Entity, SellerId, TenantId};
use stonetrade_events::Event;
use stonetrade_lots::LotId;

/// Delegation identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DelegationId(pub AggregateId);

impl DelegationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl From<DelegationId> for AggregateId {
    fn from(value: DelegationId) -> Self {
        value.0
    }
}

impl core::fmt::Display for DelegationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Something that draws on a delegation's allocation (in practice: an offer).
pub trait AllocationClaim {
    /// Delegation this claim was placed against, if any.
    fn delegation_id(&self) -> Option<DelegationId>;

    /// Quantity the claim holds or has consumed; zero once released.
    fn claimed_quantity(&self) -> u64;

    /// Whether the claim is still in a non-terminal state.
    fn is_live(&self) -> bool;
}

/// Allocation of a portion of a lot's stock to one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    id: DelegationId,
    tenant_id: TenantId,
    lot_id: LotId,
    seller_id: SellerId,
    delegated_quantity: u64,
    /// Floor unit price the seller may not sell below.
    agreed_min_price: u64,
    created_at: DateTime<Utc>,
}

/// Command: AllocateStock (create a delegation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateStock {
    pub tenant_id: TenantId,
    pub delegation_id: DelegationId,
    pub lot_id: LotId,
    pub seller_id: SellerId,
    pub quantity: u64,
    pub agreed_min_price: u64,
    pub occurred_at: DateTime<Utc>,
}

impl Delegation {
    /// Validate an allocation against the lot's current available quantity.
    ///
    /// `available` must come from a fresh reconciliation of the lot, never
    /// from its `total`.
    pub fn allocate(cmd: &AllocateStock, available: u64) -> DomainResult<Self> {
        if cmd.quantity == 0 {
            return Err(DomainError::validation("delegated quantity must be positive"));
        }
        if cmd.quantity > available {
            return Err(DomainError::insufficient_stock(cmd.lot_id, cmd.quantity, available));
        }

        Ok(Self {
            id: cmd.delegation_id,
            tenant_id: cmd.tenant_id,
            lot_id: cmd.lot_id,
            seller_id: cmd.seller_id,
            delegated_quantity: cmd.quantity,
            agreed_min_price: cmd.agreed_min_price,
            created_at: cmd.occurred_at,
        })
    }

    pub fn id_typed(&self) -> DelegationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn seller_id(&self) -> SellerId {
        self.seller_id
    }

    pub fn delegated_quantity(&self) -> u64 {
        self.delegated_quantity
    }

    pub fn agreed_min_price(&self) -> u64 {
        self.agreed_min_price
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Claims placed against this delegation (a query, not an owned collection).
    pub fn claims<'a, C>(&self, claims: impl IntoIterator<Item = &'a C>) -> impl Iterator<Item = &'a C>
    where
        C: AllocationClaim + 'a,
    {
        let id = self.id;
        claims
            .into_iter()
            .filter(move |c| c.delegation_id() == Some(id))
    }

    /// Delegated quantity minus everything already committed or sold against it.
    pub fn remaining_net_quantity<'a, C>(&self, claims: impl IntoIterator<Item = &'a C>) -> u64
    where
        C: AllocationClaim + 'a,
    {
        let used: u64 = self.claims(claims).map(|c| c.claimed_quantity()).sum();
        self.delegated_quantity.saturating_sub(used)
    }

    /// Revocation guard: no live claim may still reference this delegation.
    pub fn ensure_revocable<'a, C>(&self, claims: impl IntoIterator<Item = &'a C>) -> DomainResult<()>
    where
        C: AllocationClaim + 'a,
    {
        let live_offers = self.claims(claims).filter(|c| c.is_live()).count();
        if live_offers > 0 {
            return Err(DomainError::DelegationInUse {
                delegation_id: self.id.0,
                live_offers,
            });
        }
        Ok(())
    }
}

impl Entity for Delegation {
    type Id = DelegationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Event: DelegationCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationCreated {
    pub tenant_id: TenantId,
    pub delegation_id: DelegationId,
    pub lot_id: LotId,
    pub seller_id: SellerId,
    pub quantity: u64,
    pub agreed_min_price: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DelegationRevoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRevoked {
    pub tenant_id: TenantId,
    pub delegation_id: DelegationId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationEvent {
    DelegationCreated(DelegationCreated),
    DelegationRevoked(DelegationRevoked),
}

impl DelegationEvent {
    pub fn created(delegation: &Delegation) -> Self {
        DelegationEvent::DelegationCreated(DelegationCreated {
            tenant_id: delegation.tenant_id,
            delegation_id: delegation.id,
            lot_id: delegation.lot_id,
            seller_id: delegation.seller_id,
            quantity: delegation.delegated_quantity,
            agreed_min_price: delegation.agreed_min_price,
            occurred_at: delegation.created_at,
        })
    }

    pub fn revoked(delegation: &Delegation, occurred_at: DateTime<Utc>) -> Self {
        DelegationEvent::DelegationRevoked(DelegationRevoked {
            tenant_id: delegation.tenant_id,
            delegation_id: delegation.id,
            lot_id: delegation.lot_id,
            occurred_at,
        })
    }

    pub fn delegation_id(&self) -> DelegationId {
        match self {
            DelegationEvent::DelegationCreated(e) => e.delegation_id,
            DelegationEvent::DelegationRevoked(e) => e.delegation_id,
        }
    }
}

impl Event for DelegationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DelegationEvent::DelegationCreated(_) => "delegations.delegation.created",
            DelegationEvent::DelegationRevoked(_) => "delegations.delegation.revoked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DelegationEvent::DelegationCreated(e) => e.occurred_at,
            DelegationEvent::DelegationRevoked(e) => e.occurred_at,
        }
    }
}
