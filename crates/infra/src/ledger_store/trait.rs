use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use stonetrade_core::{AggregateId, ExpectedVersion, TenantId};
use stonetrade_events::Event;
use stonetrade_reconciliation::{LedgerEvent, Ledgers};
use std::sync::Arc;

/// A ledger event about to be committed (no sequence number yet).
///
/// Built from a typed [`LedgerEvent`] with [`UncommittedEvent::from_typed`],
/// which serializes the payload and captures the metadata needed to decode it
/// again later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A committed ledger event.
///
/// Sequence numbers are per tenant, start at 1 and have no gaps. The tenant's
/// ledger version is the sequence number of its latest event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Position in the tenant's journal.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Convert into a tenant-scoped envelope for publication.
    pub fn to_envelope(&self) -> stonetrade_events::EventEnvelope<JsonValue> {
        stonetrade_events::EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.event_type.clone(),
            self.sequence_number,
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Committed state of one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantLedgers {
    pub ledgers: Ledgers,
    /// Sequence number of the last committed event; 0 for a fresh tenant.
    pub version: u64,
}

/// Ledger store operation error.
///
/// Infrastructure failures only; business rule violations are `DomainError`s
/// and never reach the store.
#[derive(Debug, Error)]
pub enum LedgerStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("ledger store lock poisoned")]
    Poisoned,
}

/// Transactional, tenant-scoped store for the three ledgers.
///
/// The lots, delegations and offers of a tenant form one unit with a single
/// version. A commit replaces the whole unit and appends the events that
/// explain the change, or does nothing at all.
///
/// Implementations must:
/// - reject a commit whose `expected_version` does not match the current version
/// - reject events tagged with another tenant
/// - assign sequence numbers starting at `current_version + 1`
/// - make the new ledgers and the appended events visible together
pub trait LedgerStore: Send + Sync {
    /// Current ledgers and version for a tenant (empty state if never written).
    fn load(&self, tenant_id: TenantId) -> Result<TenantLedgers, LedgerStoreError>;

    /// Swap in `ledgers` and append `events` if the tenant is still at
    /// `expected_version`.
    fn commit(
        &self,
        tenant_id: TenantId,
        expected_version: ExpectedVersion,
        ledgers: Ledgers,
        events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, LedgerStoreError>;

    /// Apply `append` to the latest ledgers under the store's write lock and
    /// commit the events it returns, without a version check.
    ///
    /// Only for mutations with no precondition on other records (view
    /// logging). The closure always starts from the committed state, so
    /// concurrent commits are never overwritten. If it fails nothing changes.
    fn append_with<T, E>(
        &self,
        tenant_id: TenantId,
        append: impl FnOnce(&mut Ledgers) -> Result<(T, Vec<UncommittedEvent>), E>,
    ) -> Result<(T, Vec<StoredEvent>), E>
    where
        E: From<LedgerStoreError>;

    /// The tenant's journal in sequence order.
    fn events(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, LedgerStoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load(&self, tenant_id: TenantId) -> Result<TenantLedgers, LedgerStoreError> {
        (**self).load(tenant_id)
    }

    fn commit(
        &self,
        tenant_id: TenantId,
        expected_version: ExpectedVersion,
        ledgers: Ledgers,
        events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, LedgerStoreError> {
        (**self).commit(tenant_id, expected_version, ledgers, events)
    }

    fn append_with<T, E>(
        &self,
        tenant_id: TenantId,
        append: impl FnOnce(&mut Ledgers) -> Result<(T, Vec<UncommittedEvent>), E>,
    ) -> Result<(T, Vec<StoredEvent>), E>
    where
        E: From<LedgerStoreError>,
    {
        (**self).append_with(tenant_id, append)
    }

    fn events(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, LedgerStoreError> {
        (**self).events(tenant_id)
    }
}

impl UncommittedEvent {
    pub fn from_typed(
        tenant_id: TenantId,
        event_id: Uuid,
        event: &LedgerEvent,
    ) -> Result<Self, LedgerStoreError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| LedgerStoreError::InvalidCommit(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id: event.aggregate_id(),
            aggregate_type: event.aggregate_type().to_string(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
