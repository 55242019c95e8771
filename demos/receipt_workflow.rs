//! Receipt reconciliation walkthrough
//!
//! Runs against a canned extractor by default. Set `LEDGER_ACCESS_TOKEN`
//! (and optionally `LEDGER_API_URL`) to probe a live extraction service.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use receipt_ledger::utils::MemoryStorage;
use receipt_ledger::{
    CommitOutcome, Creditor, CreditorInfo, Customer, ExtractedData, ExtractionError,
    ExtractionService, HttpExtractionClient, LedgerConfig, LedgerStore, ReceiptImage,
    ReconciliationEngine, ScanUpdate,
};
use std::sync::Arc;

/// Returns the same deposit slip for every image
struct CannedExtractor;

#[async_trait]
impl ExtractionService for CannedExtractor {
    async fn extract_receipt(
        &self,
        _image: &ReceiptImage,
        _known_creditors: &[Creditor],
    ) -> Result<ExtractedData, ExtractionError> {
        Ok(ExtractedData {
            amount: BigDecimal::from(400_000),
            date: "1403/04/12 14:30".to_string(),
            ref_number: "738291".to_string(),
            sender: "Reza Ahmadi".to_string(),
            receiver: "6037-9911-0000-4321".to_string(),
            description: "Installment 1".to_string(),
            ..Default::default()
        })
    }

    async fn extract_creditor_info(
        &self,
        _image: &ReceiptImage,
    ) -> Result<CreditorInfo, ExtractionError> {
        Ok(CreditorInfo {
            name: "Sarraf Ferdowsi".to_string(),
            account: "6037 9911 0000 4321".to_string(),
            sheba: "IR12 0170 0000 0012 3456 7890".to_string(),
        })
    }

    async fn check_connection(&self) -> Result<String, ExtractionError> {
        Ok("canned extractor ready".to_string())
    }
}

fn slip(reference: &str) -> ReceiptImage {
    ReceiptImage::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg")
        .with_file_name("slip.jpg")
        .with_reference(reference)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Receipt Ledger - Reconciliation Example\n");

    let config = LedgerConfig::from_env()?;
    if config.extraction.access_token.is_some() {
        let client = HttpExtractionClient::new(&config.extraction)?;
        match client.check_connection().await {
            Ok(message) => println!("🌐 Extraction service: {}\n", message),
            Err(e) => println!("⚠️  Extraction service unreachable: {}\n", e),
        }
    }

    let store = LedgerStore::open(MemoryStorage::new())?;
    let mut engine = ReconciliationEngine::new(store, Arc::new(CannedExtractor));

    // 1. Register a creditor from a scanned card and a customer
    println!("📇 Setting up creditors and customers...");
    let info = engine.scan_creditor_info(&slip("card")).await?;
    let creditor = engine.upsert_creditor(receipt_ledger::creditor_from_scan(
        info,
        BigDecimal::from(1_500_000),
    ))?;
    println!(
        "  ✓ Creditor: {} (sheba {})",
        creditor.name, creditor.sheba_number
    );

    let customer = engine.upsert_customer(Customer::new(
        "Reza Ahmadi".to_string(),
        BigDecimal::from(1_000_000),
        "1403/06/31".to_string(),
    ))?;
    println!("  ✓ Customer: {} owes {}\n", customer.name, customer.expected_amount);

    // 2. Scan and confirm a receipt
    println!("📷 Scanning first receipt...");
    if let ScanUpdate::Reviewing(data) = engine.scan_receipt(&customer.id, slip("blob:1")).await? {
        println!("  Extracted {} ref {} from {}", data.amount, data.ref_number, data.sender);
    }
    if let CommitOutcome::Committed(record) = engine.confirm_scan(false)? {
        println!(
            "  ✓ Stored receipt {} (matched creditor: {})\n",
            record.id,
            record.matched_creditor_id.as_deref().unwrap_or("none")
        );
    }

    // 3. Scanning the same slip again is caught
    println!("🔁 Scanning the same slip again...");
    match engine.scan_receipt(&customer.id, slip("blob:2")).await? {
        ScanUpdate::DuplicateFound { existing, .. } => {
            println!("  ⚠️  Looks like receipt {} already on file", existing.id);
            engine.cancel_scan();
            println!("  ✓ Discarded\n");
        }
        other => println!("  Unexpected update: {:?}\n", other),
    }

    // 4. Reports
    let snapshot = engine.snapshot();
    let summary = snapshot.dashboard_summary();
    println!("📊 Dashboard");
    println!("  Total debts:       {}", summary.total_debts);
    println!("  Total receivables: {}", summary.total_receivables);
    println!("  Total collected:   {}", summary.total_collected);
    println!("  Net position:      {}", summary.net_position);

    for coverage in snapshot.creditor_coverages() {
        println!(
            "  {}: {} of {} ({}%)",
            coverage.name, coverage.matched_amount, coverage.total_amount, coverage.progress_percent
        );
    }

    let report = engine.store().verify_integrity();
    println!(
        "\n🔍 Integrity: {}",
        if report.is_valid { "balanced" } else { "drift detected" }
    );

    Ok(())
}
