//! Domain error model.

use thiserror::Error;

use crate::id::AggregateId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
///
/// The stock-specific variants carry the ids and quantities involved so the
/// presentation layer can turn them into actionable messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,

    /// Requested quantity exceeds what is currently available.
    ///
    /// `delegation_id` is set when the binding bound was a delegation's
    /// remaining quantity rather than the lot's available stock.
    #[error(
        "insufficient stock on lot {lot_id}{}: requested {requested}, available {available}",
        delegation_scope(.delegation_id)
    )]
    InsufficientStock {
        lot_id: AggregateId,
        delegation_id: Option<AggregateId>,
        requested: u64,
        available: u64,
    },

    /// A delegation still has live (non-terminal) offers.
    #[error("delegation {delegation_id} is referenced by {live_offers} live offer(s)")]
    DelegationInUse {
        delegation_id: AggregateId,
        live_offers: usize,
    },

    /// Offer status transition not present in the lifecycle table.
    #[error("illegal transition for offer {offer_id}: cannot {event} from {from}")]
    IllegalTransition {
        offer_id: AggregateId,
        from: &'static str,
        event: &'static str,
    },

    /// Derived quantities broke conservation or went negative.
    #[error("reconciliation fault on lot {lot_id}: {detail}")]
    ReconciliationFault { lot_id: AggregateId, detail: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn insufficient_stock(lot_id: impl Into<AggregateId>, requested: u64, available: u64) -> Self {
        Self::InsufficientStock {
            lot_id: lot_id.into(),
            delegation_id: None,
            requested,
            available,
        }
    }

    /// Quantity exceeds what is left on a delegation.
    pub fn insufficient_delegated_stock(
        lot_id: impl Into<AggregateId>,
        delegation_id: impl Into<AggregateId>,
        requested: u64,
        remaining: u64,
    ) -> Self {
        Self::InsufficientStock {
            lot_id: lot_id.into(),
            delegation_id: Some(delegation_id.into()),
            requested,
            available: remaining,
        }
    }

    pub fn reconciliation_fault(lot_id: impl Into<AggregateId>, detail: impl Into<String>) -> Self {
        Self::ReconciliationFault {
            lot_id: lot_id.into(),
            detail: detail.into(),
        }
    }
}

fn delegation_scope(delegation_id: &Option<AggregateId>) -> String {
    delegation_id
        .map(|id| format!(" (delegation {id})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_errors_name_the_binding_bound() {
        let lot = AggregateId::new();
        let delegation = AggregateId::new();

        let on_lot = DomainError::insufficient_stock(lot, 9, 4).to_string();
        let on_delegation = DomainError::insufficient_delegated_stock(lot, delegation, 9, 1).to_string();

        assert!(!on_lot.contains("delegation"));
        assert!(on_delegation.contains(&format!("(delegation {delegation})")));
        assert!(on_delegation.ends_with("requested 9, available 1"));
    }
}
