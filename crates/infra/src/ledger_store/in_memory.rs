use std::collections::HashMap;
use std::sync::RwLock;

use stonetrade_core::{ExpectedVersion, TenantId};
use stonetrade_reconciliation::Ledgers;

use super::r#trait::{LedgerStore, LedgerStoreError, StoredEvent, TenantLedgers, UncommittedEvent};

#[derive(Debug, Default)]
struct TenantEntry {
    ledgers: Ledgers,
    journal: Vec<StoredEvent>,
}

impl TenantEntry {
    fn version(&self) -> u64 {
        self.journal.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Swap in `ledgers` and number `events` after the current version.
    fn append(&mut self, ledgers: Ledgers, events: Vec<UncommittedEvent>) -> Vec<StoredEvent> {
        let mut next = self.version() + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            committed.push(StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            });
            next += 1;
        }

        self.journal.extend(committed.iter().cloned());
        self.ledgers = ledgers;
        committed
    }
}

fn check_events(tenant_id: TenantId, events: &[UncommittedEvent]) -> Result<(), LedgerStoreError> {
    if events.is_empty() {
        return Err(LedgerStoreError::InvalidCommit(
            "commit carries no events".to_string(),
        ));
    }
    for (idx, e) in events.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(LedgerStoreError::TenantIsolation(format!(
                "event at index {idx} belongs to another tenant"
            )));
        }
    }
    Ok(())
}

/// In-memory ledger store.
///
/// Commits are serialised by a single `RwLock`; loads clone a consistent
/// state under the read lock.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tenants: RwLock<HashMap<TenantId, TenantEntry>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self, tenant_id: TenantId) -> Result<TenantLedgers, LedgerStoreError> {
        let tenants = self.tenants.read().map_err(|_| LedgerStoreError::Poisoned)?;

        Ok(tenants
            .get(&tenant_id)
            .map(|entry| TenantLedgers {
                ledgers: entry.ledgers.clone(),
                version: entry.version(),
            })
            .unwrap_or_default())
    }

    fn commit(
        &self,
        tenant_id: TenantId,
        expected_version: ExpectedVersion,
        ledgers: Ledgers,
        events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, LedgerStoreError> {
        check_events(tenant_id, &events)?;

        let mut tenants = self.tenants.write().map_err(|_| LedgerStoreError::Poisoned)?;
        let entry = tenants.entry(tenant_id).or_default();
        let current = entry.version();

        if !expected_version.matches(current) {
            return Err(LedgerStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        Ok(entry.append(ledgers, events))
    }

    fn append_with<T, E>(
        &self,
        tenant_id: TenantId,
        append: impl FnOnce(&mut Ledgers) -> Result<(T, Vec<UncommittedEvent>), E>,
    ) -> Result<(T, Vec<StoredEvent>), E>
    where
        E: From<LedgerStoreError>,
    {
        let mut tenants = self.tenants.write().map_err(|_| LedgerStoreError::Poisoned)?;
        let mut working = tenants
            .get(&tenant_id)
            .map(|entry| entry.ledgers.clone())
            .unwrap_or_default();

        let (value, events) = append(&mut working)?;
        check_events(tenant_id, &events)?;

        let committed = tenants.entry(tenant_id).or_default().append(working, events);
        Ok((value, committed))
    }

    fn events(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, LedgerStoreError> {
        let tenants = self.tenants.read().map_err(|_| LedgerStoreError::Poisoned)?;

        Ok(tenants
            .get(&tenant_id)
            .map(|entry| entry.journal.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stonetrade_core::AggregateId;
    use stonetrade_lots::{LotId, RegisterLot};

    fn register_on(ledgers: &mut Ledgers, tenant_id: TenantId) -> Vec<UncommittedEvent> {
        let applied = ledgers
            .register_lot(RegisterLot {
                tenant_id,
                lot_id: LotId::new(AggregateId::new()),
                code: "SLATE-3".to_string(),
                total: 12,
                base_cost: 2_000,
                floor_price: 3_000,
                occurred_at: Utc::now(),
            })
            .unwrap();
        applied
            .events
            .iter()
            .map(|e| UncommittedEvent::from_typed(tenant_id, uuid::Uuid::now_v7(), e).unwrap())
            .collect()
    }

    fn registered(tenant_id: TenantId) -> (Ledgers, Vec<UncommittedEvent>) {
        let mut ledgers = Ledgers::new();
        let events = register_on(&mut ledgers, tenant_id);
        (ledgers, events)
    }

    #[test]
    fn fresh_tenant_loads_empty_at_version_zero() {
        let store = InMemoryLedgerStore::new();

        let state = store.load(TenantId::new()).unwrap();

        assert_eq!(state, TenantLedgers::default());
    }

    #[test]
    fn commit_swaps_ledgers_and_numbers_events() {
        let store = InMemoryLedgerStore::new();
        let tenant_id = TenantId::new();
        let (ledgers, events) = registered(tenant_id);

        let committed = store
            .commit(tenant_id, ExpectedVersion::Exact(0), ledgers.clone(), events)
            .unwrap();

        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(committed[0].event_type, "lots.lot.registered");
        let state = store.load(tenant_id).unwrap();
        assert_eq!(state.version, 1);
        assert_eq!(state.ledgers, ledgers);
    }

    #[test]
    fn stale_version_is_rejected_and_state_kept() {
        let store = InMemoryLedgerStore::new();
        let tenant_id = TenantId::new();
        let (first, events) = registered(tenant_id);
        store
            .commit(tenant_id, ExpectedVersion::Exact(0), first.clone(), events)
            .unwrap();

        let (second, events) = registered(tenant_id);
        let err = store
            .commit(tenant_id, ExpectedVersion::Exact(0), second, events)
            .unwrap_err();

        assert!(matches!(err, LedgerStoreError::Concurrency(_)));
        assert_eq!(store.load(tenant_id).unwrap().ledgers, first);
        assert_eq!(store.events(tenant_id).unwrap().len(), 1);
    }

    #[test]
    fn foreign_events_are_rejected() {
        let store = InMemoryLedgerStore::new();
        let (ledgers, events) = registered(TenantId::new());

        let err = store
            .commit(TenantId::new(), ExpectedVersion::Any, ledgers, events)
            .unwrap_err();

        assert!(matches!(err, LedgerStoreError::TenantIsolation(_)));
    }

    #[test]
    fn tenants_are_isolated() {
        let store = InMemoryLedgerStore::new();
        let tenant_a = TenantId::new();
        let (ledgers, events) = registered(tenant_a);
        store
            .commit(tenant_a, ExpectedVersion::Exact(0), ledgers, events)
            .unwrap();

        let other = store.load(TenantId::new()).unwrap();

        assert_eq!(other.version, 0);
        assert_eq!(other.ledgers.lots().count(), 0);
    }

    #[test]
    fn append_with_builds_on_the_latest_commit() {
        let store = InMemoryLedgerStore::new();
        let tenant_id = TenantId::new();
        let (ledgers, events) = registered(tenant_id);
        store
            .commit(tenant_id, ExpectedVersion::Exact(0), ledgers, events)
            .unwrap();

        let (seen, committed) = store
            .append_with(tenant_id, |current| -> Result<_, LedgerStoreError> {
                let seen = current.lots().count();
                Ok((seen, register_on(current, tenant_id)))
            })
            .unwrap();

        assert_eq!(seen, 1);
        assert_eq!(committed[0].sequence_number, 2);
        let state = store.load(tenant_id).unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.ledgers.lots().count(), 2);
    }

    #[test]
    fn failed_append_changes_nothing() {
        let store = InMemoryLedgerStore::new();
        let tenant_id = TenantId::new();
        let (ledgers, events) = registered(tenant_id);
        store
            .commit(tenant_id, ExpectedVersion::Exact(0), ledgers.clone(), events)
            .unwrap();

        let err = store
            .append_with(tenant_id, |current| -> Result<((), _), LedgerStoreError> {
                register_on(current, tenant_id);
                Err(LedgerStoreError::InvalidCommit("rejected".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, LedgerStoreError::InvalidCommit(_)));

        let err = store
            .append_with(tenant_id, |current| -> Result<_, LedgerStoreError> {
                register_on(current, tenant_id);
                Ok(((), Vec::new()))
            })
            .unwrap_err();
        assert!(matches!(err, LedgerStoreError::InvalidCommit(_)));

        let state = store.load(tenant_id).unwrap();
        assert_eq!(state.version, 1);
        assert_eq!(state.ledgers, ledgers);
    }
}
