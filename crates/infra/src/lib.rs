//! Infrastructure layer: ledger store, configuration and the trading desk.

pub mod config;
pub mod desk;
pub mod ledger_store;
pub mod messages;


pub use config::{ConfigError, DeskConfig};
pub use desk::{DeskError, NewOffer, TenantView, TradeDesk};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, LedgerStoreError};
pub use messages::{DeskMessage, SaleConfirmed, SnapshotPublished};
