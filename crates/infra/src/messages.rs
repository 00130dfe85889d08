//! Messages the desk publishes after a commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stonetrade_core::{ClientId, Party, TenantId};
use stonetrade_events::{EventEnvelope, TenantScoped};
use stonetrade_lots::LotId;
use stonetrade_offers::{Offer, OfferId};
use stonetrade_reconciliation::QuantitySnapshot;

/// Everything that travels on the desk's bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeskMessage {
    /// One committed ledger event.
    Event(EventEnvelope<JsonValue>),
    /// Fresh snapshots recomputed from the committed ledgers.
    SnapshotPublished(SnapshotPublished),
    /// A sale was finalized; addressed to the offer's originator.
    SaleConfirmed(SaleConfirmed),
}

impl DeskMessage {
    pub fn as_event(&self) -> Option<&EventEnvelope<JsonValue>> {
        match self {
            DeskMessage::Event(envelope) => Some(envelope),
            _ => None,
        }
    }
}

impl TenantScoped for DeskMessage {
    fn tenant_id(&self) -> TenantId {
        match self {
            DeskMessage::Event(envelope) => envelope.tenant_id(),
            DeskMessage::SnapshotPublished(m) => m.tenant_id,
            DeskMessage::SaleConfirmed(m) => m.tenant_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPublished {
    pub tenant_id: TenantId,
    /// Ledger version the snapshots were computed from.
    pub ledger_version: u64,
    pub snapshots: Vec<QuantitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfirmed {
    pub tenant_id: TenantId,
    pub recipient: Party,
    pub offer_id: OfferId,
    pub lot_id: LotId,
    pub client_id: ClientId,
    pub client_name: String,
    pub quantity: u64,
    pub final_price: u64,
    pub confirmed_at: DateTime<Utc>,
}

impl SaleConfirmed {
    pub fn for_offer(tenant_id: TenantId, offer: &Offer, confirmed_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            recipient: offer.originator(),
            offer_id: offer.id_typed(),
            lot_id: offer.lot_id(),
            client_id: offer.client_id(),
            client_name: offer.client_name().to_string(),
            quantity: offer.quantity_offered(),
            final_price: offer.final_price(),
            confirmed_at,
        }
    }
}
