//! Ledger module containing the entity store and derived reports

pub mod reports;
pub mod store;

pub use reports::*;
pub use store::*;
