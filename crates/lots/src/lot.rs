use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stonetrade_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use stonetrade_events::Event;

/// Lot identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub AggregateId);

impl LotId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl From<LotId> for AggregateId {
    fn from(value: LotId) -> Self {
        value.0
    }
}

impl core::fmt::Display for LotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    id: LotId,
    tenant_id: Option<TenantId>,
    code: String,
    total: u64,
    /// Industry cost per unit in smallest currency unit.
    base_cost: u64,
    /// Minimum unit price for direct sales in smallest currency unit.
    floor_price: u64,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Lot {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: LotId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            total: 0,
            base_cost: 0,
            floor_price: 0,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn base_cost(&self) -> u64 {
        self.base_cost
    }

    pub fn floor_price(&self) -> u64 {
        self.floor_price
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Lot {
    type Id = LotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterLot (batch intake).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLot {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub code: String,
    pub total: u64,
    pub base_cost: u64,
    pub floor_price: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotCommand {
    RegisterLot(RegisterLot),
}

/// Event: LotRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRegistered {
    pub tenant_id: TenantId,
    pub lot_id: LotId,
    pub code: String,
    pub total: u64,
    pub base_cost: u64,
    pub floor_price: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotEvent {
    LotRegistered(LotRegistered),
}

impl Event for LotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LotEvent::LotRegistered(_) => "lots.lot.registered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LotEvent::LotRegistered(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Lot {
    type Command = LotCommand;
    type Event = LotEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LotEvent::LotRegistered(e) => {
                self.id = e.lot_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.total = e.total;
                self.base_cost = e.base_cost;
                self.floor_price = e.floor_price;
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LotCommand::RegisterLot(cmd) => self.handle_register(cmd),
        }
    }
}

impl Lot {
    fn handle_register(&self, cmd: &RegisterLot) -> Result<Vec<LotEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("lot already registered"));
        }
        if self.id != cmd.lot_id {
            return Err(DomainError::invariant("lot_id mismatch"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("lot code cannot be empty"));
        }

        Ok(vec![LotEvent::LotRegistered(LotRegistered {
            tenant_id: cmd.tenant_id,
            lot_id: cmd.lot_id,
            code: cmd.code.trim().to_string(),
            total: cmd.total,
            base_cost: cmd.base_cost,
            floor_price: cmd.floor_price,
            occurred_at: cmd.occurred_at,
        })])
    }
}
