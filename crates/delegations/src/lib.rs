//! Delegation ledger.
//!
//! A delegation allocates part of a lot's stock to one seller at an agreed
//! floor price. Delegations are plain ledger records (not event-sourced);
//! offers refer to them by id and are never owned by them.

pub mod delegation;

pub use delegation::{
    AllocateStock, AllocationClaim, Delegation, DelegationCreated, DelegationEvent, DelegationId,
    DelegationRevoked,
};
