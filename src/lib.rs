//! # Receipt Ledger
//!
//! Bookkeeping core for a small money-transfer business: debts owed to
//! creditors (currency exchangers), receivables from customers, and a
//! ledger of deposit receipts reconciled against both.
//!
//! ## Features
//!
//! - **Ledger store**: creditors, customers and receipt records with
//!   atomic, validated mutations and a customer balance that always equals
//!   the sum of its receipts
//! - **Duplicate detection**: reference number first, then amount, date and
//!   sender
//! - **Creditor matching**: account number, then sheba number
//! - **Scan sessions**: the extract, review, override and commit flow around
//!   an external OCR service, tolerant of late responses
//! - **Reports**: dashboard totals, collection progress, creditor coverage
//! - **Storage abstraction**: key-value persistence with in-memory and JSON
//!   file backends
//!
//! ## Quick Start
//!
//! ```rust
//! use receipt_ledger::{utils::MemoryStorage, Customer, LedgerStore};
//! use bigdecimal::BigDecimal;
//!
//! let mut store = LedgerStore::open(MemoryStorage::new()).unwrap();
//! let customer = store
//!     .upsert_customer(Customer::new(
//!         "Reza".to_string(),
//!         BigDecimal::from(1_000_000),
//!         "1403/06/01".to_string(),
//!     ))
//!     .unwrap();
//! assert_eq!(customer.collected_amount, BigDecimal::from(0));
//! ```

pub mod config;
pub mod extraction;
pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use extraction::HttpExtractionClient;
pub use ledger::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
