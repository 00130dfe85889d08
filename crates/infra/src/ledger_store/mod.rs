//! Transactional ledger store boundary.
//!
//! Holds each tenant's lots, delegations and offers as one versioned unit,
//! together with the journal of events that produced it.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{LedgerStore, LedgerStoreError, StoredEvent, TenantLedgers, UncommittedEvent};
