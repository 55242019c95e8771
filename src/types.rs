//! Core types and data structures for the receipt ledger

use bigdecimal::BigDecimal;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::utils::validation::format_sheba;

/// Current time truncated to the millisecond precision used on disk
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Mint a fresh entity id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A currency exchanger the business owes money to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creditor {
    /// Unique identifier
    pub id: String,
    /// Display name, unique among creditors
    pub name: String,
    /// Bank account number receipts are paid into
    pub account_number: String,
    /// IBAN-style sheba number, stored with its `IR` prefix
    pub sheba_number: String,
    /// Total debt owed to this creditor
    pub total_amount: BigDecimal,
    /// Legacy advisory field; live coverage is derived from matched records
    pub remaining_amount: BigDecimal,
    /// When the creditor was created
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Creditor {
    /// Create a new creditor with a freshly minted id
    pub fn new(
        name: String,
        account_number: String,
        sheba_number: String,
        total_amount: BigDecimal,
    ) -> Self {
        Self {
            id: new_id(),
            name,
            account_number,
            sheba_number: format_sheba(&sheba_number),
            remaining_amount: total_amount.clone(),
            total_amount,
            created_at: now(),
        }
    }
}

/// A debtor whose payments are reconciled through receipts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Unique identifier
    pub id: String,
    /// Display name, unique among customers
    pub name: String,
    /// Amount the customer is expected to pay in total
    pub expected_amount: BigDecimal,
    /// Sum of all receipt amounts attributed to this customer.
    /// Maintained by the ledger store only.
    pub collected_amount: BigDecimal,
    /// Due date as entered by the user (`YYYY/MM/DD`), empty when immediate
    pub maturity_date: String,
    /// When the customer was created
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Create a new customer with nothing collected yet
    pub fn new(name: String, expected_amount: BigDecimal, maturity_date: String) -> Self {
        Self {
            id: new_id(),
            name,
            expected_amount,
            collected_amount: BigDecimal::from(0),
            maturity_date,
            created_at: now(),
        }
    }

    /// Amount still outstanding (may be negative on overpayment)
    pub fn remaining_amount(&self) -> BigDecimal {
        &self.expected_amount - &self.collected_amount
    }
}

/// One confirmed deposit slip attributed to a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    pub id: String,
    /// Owning customer; may dangle after the customer is deleted
    pub customer_id: String,
    pub amount: BigDecimal,
    pub date: String,
    pub ref_number: String,
    pub sender: String,
    pub receiver: String,
    pub description: String,
    pub image_url: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub dynamic_fields: HashMap<String, String>,
    /// Non-owning reference used for debt coverage reporting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_creditor_id: Option<String>,
}

impl ReceiptRecord {
    /// Build a record from confirmed extraction output
    pub fn from_extracted(
        customer_id: String,
        extracted: ExtractedData,
        image_url: String,
    ) -> Self {
        Self {
            id: new_id(),
            customer_id,
            amount: extracted.amount,
            date: extracted.date,
            ref_number: extracted.ref_number,
            sender: extracted.sender,
            receiver: extracted.receiver,
            description: extracted.description,
            image_url,
            created_at: now(),
            dynamic_fields: extracted.dynamic_fields,
            matched_creditor_id: extracted.matched_creditor_id,
        }
    }
}

/// Best-effort fields read off a receipt image by the extraction service.
///
/// Unrecognized text fields arrive as empty strings; a missing amount
/// decodes as zero and is rejected at commit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedData {
    pub amount: BigDecimal,
    pub date: String,
    pub ref_number: String,
    pub sender: String,
    pub receiver: String,
    pub description: String,
    pub dynamic_fields: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_creditor_id: Option<String>,
}

/// Creditor details read off a bank card or statement image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditorInfo {
    pub name: String,
    pub account: String,
    pub sheba: String,
}

/// An image handed to the extraction service
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptImage {
    /// Raw image bytes
    pub bytes: Vec<u8>,
    /// MIME type, must be `image/*`
    pub content_type: String,
    /// File name sent with the upload
    pub file_name: String,
    /// Reference stored as the record's `imageUrl`
    pub reference: String,
}

impl ReceiptImage {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            file_name: "receipt".to_string(),
            reference: String::new(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Reject anything that is not an image
    pub fn validate(&self) -> LedgerResult<()> {
        if !self.content_type.starts_with("image/") {
            return Err(LedgerError::Validation(format!(
                "Only image files can be scanned, got '{}'",
                self.content_type
            )));
        }
        if self.bytes.is_empty() {
            return Err(LedgerError::Validation("Image is empty".to_string()));
        }
        Ok(())
    }
}

/// Which entity collection an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Creditor,
    Customer,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Creditor => write!(f, "creditor"),
            EntityKind::Customer => write!(f, "customer"),
        }
    }
}

/// Failures of the external extraction service
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Extraction service unreachable: {0}")]
    Network(String),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Extraction service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed extraction payload: {0}")]
    MalformedPayload(String),
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("A {kind} named '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),
    #[error("Creditor not found: {0}")]
    CreditorNotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Storage(format!("Snapshot serialization failed: {}", err))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = ReceiptRecord::from_extracted(
            "c1".to_string(),
            ExtractedData {
                amount: BigDecimal::from(400000),
                ref_number: "A1".to_string(),
                ..Default::default()
            },
            "img".to_string(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["customerId"], "c1");
        assert_eq!(json["refNumber"], "A1");
        assert_eq!(json["imageUrl"], "img");
        assert!(json["createdAt"].is_i64());
        assert!(json.get("matchedCreditorId").is_none());
    }

    #[test]
    fn test_extracted_data_tolerates_missing_fields() {
        let data: ExtractedData =
            serde_json::from_str(r#"{"amount": 250000, "refNumber": "778"}"#).unwrap();
        assert_eq!(data.amount, BigDecimal::from(250000));
        assert_eq!(data.ref_number, "778");
        assert!(data.sender.is_empty());
        assert!(data.matched_creditor_id.is_none());
    }

    #[test]
    fn test_creditor_new_formats_sheba() {
        let creditor = Creditor::new(
            "Sarraf".to_string(),
            "1234".to_string(),
            "ir120000000000000000000001".to_string(),
            BigDecimal::from(5000),
        );
        assert_eq!(creditor.sheba_number, "IR120000000000000000000001");
        assert_eq!(creditor.remaining_amount, creditor.total_amount);
    }

    #[test]
    fn test_image_must_be_image() {
        let pdf = ReceiptImage::new(vec![1, 2, 3], "application/pdf");
        assert!(matches!(pdf.validate(), Err(LedgerError::Validation(_))));

        let jpg = ReceiptImage::new(vec![1, 2, 3], "image/jpeg");
        assert!(jpg.validate().is_ok());
    }
}
