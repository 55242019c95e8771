//! Reconciliation of scanned receipts against the ledger
//!
//! The [`ReconciliationEngine`] is the only component an interface layer
//! needs: it runs duplicate detection and creditor matching before handing
//! confirmed receipts to the ledger store, and drives the scan dialog
//! state machine around the external extraction service.

pub mod duplicate;
pub mod engine;
pub mod matcher;
pub mod session;

pub use duplicate::*;
pub use engine::*;
pub use matcher::*;
pub use session::*;
