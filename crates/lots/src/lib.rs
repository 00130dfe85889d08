//! Lot registry (event-sourced).
//!
//! A lot is a physical batch of stone with a fixed total quantity and its
//! monetary reference values. Lots are created at batch intake and never
//! deleted once referenced.

pub mod lot;

pub use lot::{Lot, LotCommand, LotEvent, LotId, LotRegistered, RegisterLot};
