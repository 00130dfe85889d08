//! Parties acting on, or viewing, the stock ledgers.

use serde::{Deserialize, Serialize};

use crate::id::SellerId;

/// The two distribution channels.
///
/// `Industry` is the central authority owning the stock; a `Seller` is an
/// independent partner selling delegated quantities.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seller_id", rename_all = "snake_case")]
pub enum Party {
    Industry,
    Seller(SellerId),
}

impl Party {
    pub fn is_authority(&self) -> bool {
        matches!(self, Party::Industry)
    }

    pub fn seller_id(&self) -> Option<SellerId> {
        match self {
            Party::Industry => None,
            Party::Seller(id) => Some(*id),
        }
    }
}
