//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::ledger::{LedgerEvent, LedgerSnapshot};
use crate::types::*;

/// Storage key holding the receipt records array
pub const RECORDS_KEY: &str = "acc_records";
/// Storage key holding the creditors array
pub const CREDITORS_KEY: &str = "acc_creditors";
/// Storage key holding the customers array
pub const CUSTOMERS_KEY: &str = "acc_customers";

/// Durable key-value storage for ledger snapshots
///
/// Implementations only provide raw string reads and writes; the three
/// collections are serialized as JSON arrays under [`RECORDS_KEY`],
/// [`CREDITORS_KEY`] and [`CUSTOMERS_KEY`]. Last write wins.
pub trait LedgerStorage: Send {
    /// Read the raw value stored under a key
    fn read_key(&self, key: &str) -> LedgerResult<Option<String>>;

    /// Replace the value stored under a key
    fn write_key(&mut self, key: &str, value: &str) -> LedgerResult<()>;

    /// Load the full snapshot. Missing keys load as empty collections.
    fn load(&self) -> LedgerResult<LedgerSnapshot> {
        let mut snapshot = LedgerSnapshot::default();
        if let Some(raw) = self.read_key(RECORDS_KEY)? {
            snapshot.records = serde_json::from_str(&raw)?;
        }
        if let Some(raw) = self.read_key(CREDITORS_KEY)? {
            snapshot.creditors = serde_json::from_str(&raw)?;
        }
        if let Some(raw) = self.read_key(CUSTOMERS_KEY)? {
            snapshot.customers = serde_json::from_str(&raw)?;
        }
        Ok(snapshot)
    }

    /// Persist the full snapshot
    fn save(&mut self, snapshot: &LedgerSnapshot) -> LedgerResult<()> {
        let records = serde_json::to_string(&snapshot.records)?;
        let creditors = serde_json::to_string(&snapshot.creditors)?;
        let customers = serde_json::to_string(&snapshot.customers)?;
        self.write_key(RECORDS_KEY, &records)?;
        self.write_key(CREDITORS_KEY, &creditors)?;
        self.write_key(CUSTOMERS_KEY, &customers)
    }
}

/// Trait for implementing custom entity validation rules
pub trait EntityValidator: Send {
    /// Validate a creditor before it is inserted or replaced
    fn validate_creditor(&self, creditor: &Creditor) -> LedgerResult<()>;

    /// Validate a customer before it is inserted or replaced
    fn validate_customer(&self, customer: &Customer) -> LedgerResult<()>;

    /// Validate a receipt record before it is inserted
    fn validate_record(&self, record: &ReceiptRecord) -> LedgerResult<()>;
}

/// Receives a notification after every committed ledger mutation
pub trait LedgerObserver: Send {
    fn on_change(&self, event: &LedgerEvent, snapshot: &LedgerSnapshot);
}

impl<F> LedgerObserver for F
where
    F: Fn(&LedgerEvent, &LedgerSnapshot) + Send,
{
    fn on_change(&self, event: &LedgerEvent, snapshot: &LedgerSnapshot) {
        self(event, snapshot)
    }
}

/// External OCR service turning receipt images into structured fields
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Read a deposit receipt. Known creditors are passed along so the
    /// service may propose a `matchedCreditorId`.
    async fn extract_receipt(
        &self,
        image: &ReceiptImage,
        known_creditors: &[Creditor],
    ) -> Result<ExtractedData, ExtractionError>;

    /// Read creditor account details for prefilling the creditor form
    async fn extract_creditor_info(
        &self,
        image: &ReceiptImage,
    ) -> Result<CreditorInfo, ExtractionError>;

    /// Probe the service and return its status message
    async fn check_connection(&self) -> Result<String, ExtractionError>;
}
