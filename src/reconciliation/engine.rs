//! The reconciliation engine: the single entry point an interface layer
//! talks to

use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::ledger::{LedgerSnapshot, LedgerStore, SubscriptionId};
use crate::reconciliation::duplicate::{detect_duplicate, DuplicateReason};
use crate::reconciliation::matcher::resolve_matched_creditor;
use crate::reconciliation::session::*;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

/// Result of trying to commit a receipt
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The record was stored and the customer credited
    Committed(ReceiptRecord),
    /// Nothing was stored; the candidate resembles an existing record and
    /// needs an explicit override
    DuplicateFound {
        candidate: ExtractedData,
        existing: ReceiptRecord,
        reason: DuplicateReason,
    },
}

/// Build a creditor from scanned account details
pub fn creditor_from_scan(info: CreditorInfo, total_amount: BigDecimal) -> Creditor {
    Creditor::new(info.name, info.account, info.sheba, total_amount)
}

/// Orchestrates duplicate detection, creditor matching and the ledger store
pub struct ReconciliationEngine<S: LedgerStorage, E: ExtractionService + ?Sized> {
    store: LedgerStore<S>,
    extractor: Arc<E>,
    scan: Option<ScanSession>,
    next_ticket: u64,
}

impl<S: LedgerStorage, E: ExtractionService + ?Sized> ReconciliationEngine<S, E> {
    /// Create an engine over an opened store
    pub fn new(store: LedgerStore<S>, extractor: Arc<E>) -> Self {
        Self {
            store,
            extractor,
            scan: None,
            next_ticket: 0,
        }
    }

    pub fn store(&self) -> &LedgerStore<S> {
        &self.store
    }

    pub fn snapshot(&self) -> &LedgerSnapshot {
        self.store.snapshot()
    }

    /// Register an observer for committed ledger mutations
    pub fn subscribe<O: LedgerObserver + 'static>(&mut self, observer: O) -> SubscriptionId {
        self.store.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    // Entity management

    pub fn upsert_creditor(&mut self, creditor: Creditor) -> LedgerResult<Creditor> {
        self.store.upsert_creditor(creditor)
    }

    pub fn upsert_customer(&mut self, customer: Customer) -> LedgerResult<Customer> {
        self.store.upsert_customer(customer)
    }

    pub fn remove_creditor(&mut self, creditor_id: &str) -> LedgerResult<bool> {
        self.store.remove_creditor(creditor_id)
    }

    /// Delete a customer. An open scan for that customer is abandoned.
    pub fn remove_customer(&mut self, customer_id: &str) -> LedgerResult<bool> {
        let removed = self.store.remove_customer(customer_id)?;
        if removed
            && self
                .scan
                .as_ref()
                .is_some_and(|s| s.customer_id() == customer_id)
        {
            tracing::info!(customer_id, "Closing scan for removed customer");
            self.scan = None;
        }
        Ok(removed)
    }

    /// Delete a receipt; unknown ids are a no-op
    pub fn remove_receipt(&mut self, record_id: &str) -> LedgerResult<Option<ReceiptRecord>> {
        self.store.remove_record(record_id)
    }

    // Receipts

    /// Commit extracted receipt data for a customer.
    ///
    /// Without `force_override_duplicate`, a candidate matching a stored
    /// record is not stored and both are returned for comparison.
    pub fn commit_receipt(
        &mut self,
        customer_id: &str,
        mut extracted: ExtractedData,
        image_ref: &str,
        force_override_duplicate: bool,
    ) -> LedgerResult<CommitOutcome> {
        validate_positive_amount(&extracted.amount)?;
        if self.store.customer(customer_id).is_none() {
            return Err(LedgerError::CustomerNotFound(customer_id.to_string()));
        }

        if let Some((existing, reason)) = detect_duplicate(&extracted, self.store.records()) {
            if !force_override_duplicate {
                tracing::info!(
                    customer_id,
                    existing_id = %existing.id,
                    ?reason,
                    "Duplicate receipt held for confirmation"
                );
                return Ok(CommitOutcome::DuplicateFound {
                    existing: existing.clone(),
                    candidate: extracted,
                    reason,
                });
            }
            tracing::warn!(
                customer_id,
                existing_id = %existing.id,
                ?reason,
                "Duplicate receipt committed on explicit override"
            );
        }

        extracted.matched_creditor_id = resolve_matched_creditor(&extracted, self.store.creditors());
        let record =
            ReceiptRecord::from_extracted(customer_id.to_string(), extracted, image_ref.to_string());
        let record = self.store.add_record(record)?;
        Ok(CommitOutcome::Committed(record))
    }

    // Scan sessions

    /// Current scan state; `Idle` when no scan is open
    pub fn scan_state(&self) -> &ScanState {
        self.scan.as_ref().map(ScanSession::state).unwrap_or(&IDLE)
    }

    pub fn active_scan(&self) -> Option<&ScanSession> {
        self.scan.as_ref()
    }

    /// Open a scan for a customer and hand back the extraction call to make.
    ///
    /// Any scan already open is superseded; its response will be discarded.
    pub fn begin_scan(
        &mut self,
        customer_id: &str,
        image: ReceiptImage,
    ) -> LedgerResult<ExtractionRequest<E>> {
        image.validate()?;
        if self.store.customer(customer_id).is_none() {
            return Err(LedgerError::CustomerNotFound(customer_id.to_string()));
        }

        if let Some(previous) = &self.scan {
            tracing::debug!(
                ticket = previous.ticket().0,
                state = previous.state().name(),
                "Superseding open scan"
            );
        }

        let ticket = ScanTicket(self.next_ticket);
        self.next_ticket += 1;
        self.scan = Some(ScanSession::start(
            ticket,
            customer_id.to_string(),
            image.reference.clone(),
        ));
        tracing::info!(customer_id, ticket = ticket.0, "Receipt scan started");

        Ok(ExtractionRequest {
            ticket,
            image,
            known_creditors: self.store.creditors().to_vec(),
            extractor: Arc::clone(&self.extractor),
        })
    }

    /// Apply an extraction response to the scan it was issued for
    pub fn receive_extraction(&mut self, response: ExtractionResponse) -> ScanUpdate {
        let Some(scan) = self.scan.as_mut().filter(|s| s.accepts(response.ticket)) else {
            tracing::info!(ticket = response.ticket.0, "Discarding stale extraction response");
            return ScanUpdate::Discarded;
        };

        match response.result {
            Ok(extracted) => match detect_duplicate(&extracted, self.store.records()) {
                Some((existing, reason)) => {
                    tracing::info!(
                        existing_id = %existing.id,
                        ?reason,
                        "Scanned receipt matches a stored record"
                    );
                    let existing = existing.clone();
                    scan.set_state(ScanState::AwaitingOverride {
                        extracted: extracted.clone(),
                        existing: existing.clone(),
                    });
                    ScanUpdate::DuplicateFound {
                        candidate: extracted,
                        existing,
                    }
                }
                None => {
                    scan.set_state(ScanState::Reviewing {
                        extracted: extracted.clone(),
                    });
                    ScanUpdate::Reviewing(extracted)
                }
            },
            Err(error) => {
                tracing::warn!(%error, "Receipt extraction failed");
                scan.set_state(ScanState::Failed {
                    error: error.clone(),
                });
                ScanUpdate::Failed(error)
            }
        }
    }

    /// Extract and apply in one step, for callers that never cancel
    pub async fn scan_receipt(
        &mut self,
        customer_id: &str,
        image: ReceiptImage,
    ) -> LedgerResult<ScanUpdate> {
        let request = self.begin_scan(customer_id, image)?;
        let response = request.send().await;
        Ok(self.receive_extraction(response))
    }

    /// Commit the reviewed receipt of the open scan.
    ///
    /// From `AwaitingOverride` this only commits with `force_override`;
    /// otherwise the duplicate is reported again and nothing changes.
    pub fn confirm_scan(&mut self, force_override: bool) -> LedgerResult<CommitOutcome> {
        let (customer_id, image_ref, extracted) = match &self.scan {
            Some(scan) => match scan.state() {
                ScanState::Reviewing { extracted }
                | ScanState::AwaitingOverride { extracted, .. } => (
                    scan.customer_id().to_string(),
                    scan.image_reference().to_string(),
                    extracted.clone(),
                ),
                other => {
                    return Err(LedgerError::InvalidState(format!(
                        "Cannot confirm a scan that is {}",
                        other.name()
                    )))
                }
            },
            None => {
                return Err(LedgerError::InvalidState(
                    "No scan is open".to_string(),
                ))
            }
        };

        let outcome = self.commit_receipt(&customer_id, extracted, &image_ref, force_override)?;
        if let Some(scan) = self.scan.as_mut() {
            match &outcome {
                CommitOutcome::Committed(record) => scan.set_state(ScanState::Committed {
                    record: record.clone(),
                }),
                CommitOutcome::DuplicateFound {
                    candidate,
                    existing,
                    ..
                } => scan.set_state(ScanState::AwaitingOverride {
                    extracted: candidate.clone(),
                    existing: existing.clone(),
                }),
            }
        }
        Ok(outcome)
    }

    /// Close the scan dialog from any state. Returns `false` if none was open.
    pub fn cancel_scan(&mut self) -> bool {
        match self.scan.take() {
            Some(scan) => {
                tracing::info!(
                    ticket = scan.ticket().0,
                    state = scan.state().name(),
                    "Scan closed"
                );
                true
            }
            None => false,
        }
    }

    /// Acknowledge a failed extraction and return to `Idle`
    pub fn retry_scan(&mut self) -> LedgerResult<()> {
        if matches!(self.scan_state(), ScanState::Failed { .. }) {
            self.scan = None;
            return Ok(());
        }
        Err(LedgerError::InvalidState(format!(
            "Only a failed scan can be retried, scan is {}",
            self.scan_state().name()
        )))
    }

    // Creditor form helpers

    /// Read creditor details from an image to prefill the creditor form
    pub async fn scan_creditor_info(&self, image: &ReceiptImage) -> LedgerResult<CreditorInfo> {
        image.validate()?;
        self.extractor
            .extract_creditor_info(image)
            .await
            .map_err(|error| {
                tracing::warn!(%error, "Creditor extraction failed");
                LedgerError::from(error)
            })
    }

    /// Probe the extraction service
    pub async fn check_extraction_service(&self) -> LedgerResult<String> {
        Ok(self.extractor.check_connection().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use async_trait::async_trait;

    struct FixedExtractor {
        data: ExtractedData,
    }

    #[async_trait]
    impl ExtractionService for FixedExtractor {
        async fn extract_receipt(
            &self,
            _image: &ReceiptImage,
            _known_creditors: &[Creditor],
        ) -> Result<ExtractedData, ExtractionError> {
            Ok(self.data.clone())
        }

        async fn extract_creditor_info(
            &self,
            _image: &ReceiptImage,
        ) -> Result<CreditorInfo, ExtractionError> {
            Err(ExtractionError::Unauthorized("token expired".to_string()))
        }

        async fn check_connection(&self) -> Result<String, ExtractionError> {
            Ok("ok".to_string())
        }
    }

    fn extracted(amount: i64, ref_number: &str) -> ExtractedData {
        ExtractedData {
            amount: BigDecimal::from(amount),
            ref_number: ref_number.to_string(),
            date: "1403/02/10".to_string(),
            sender: "Reza".to_string(),
            ..Default::default()
        }
    }

    fn engine() -> (ReconciliationEngine<MemoryStorage, FixedExtractor>, Customer) {
        let store = LedgerStore::open(MemoryStorage::new()).unwrap();
        let mut engine = ReconciliationEngine::new(
            store,
            Arc::new(FixedExtractor {
                data: extracted(400_000, "A1"),
            }),
        );
        let customer = engine
            .upsert_customer(Customer::new(
                "C".to_string(),
                BigDecimal::from(1_000_000),
                String::new(),
            ))
            .unwrap();
        (engine, customer)
    }

    fn collected(engine: &ReconciliationEngine<MemoryStorage, FixedExtractor>, id: &str) -> BigDecimal {
        engine.store().customer(id).unwrap().collected_amount.clone()
    }

    fn image() -> ReceiptImage {
        ReceiptImage::new(vec![0xFF, 0xD8], "image/jpeg").with_reference("blob:1")
    }

    #[test]
    fn test_commit_then_duplicate_then_override() {
        let (mut engine, customer) = engine();

        let first = engine
            .commit_receipt(&customer.id, extracted(400_000, "A1"), "img", false)
            .unwrap();
        let CommitOutcome::Committed(first) = first else {
            panic!("expected a commit");
        };
        assert_eq!(collected(&engine, &customer.id), BigDecimal::from(400_000));

        let again = engine
            .commit_receipt(&customer.id, extracted(400_000, "A1"), "img", false)
            .unwrap();
        match again {
            CommitOutcome::DuplicateFound {
                existing, reason, ..
            } => {
                assert_eq!(existing.id, first.id);
                assert_eq!(reason, DuplicateReason::RefNumber);
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(engine.snapshot().records.len(), 1);
        assert_eq!(collected(&engine, &customer.id), BigDecimal::from(400_000));

        let forced = engine
            .commit_receipt(&customer.id, extracted(400_000, "A1"), "img", true)
            .unwrap();
        assert!(matches!(forced, CommitOutcome::Committed(_)));
        assert_eq!(collected(&engine, &customer.id), BigDecimal::from(800_000));

        engine.remove_receipt(&first.id).unwrap();
        assert_eq!(collected(&engine, &customer.id), BigDecimal::from(400_000));
    }

    #[test]
    fn test_commit_rejects_zero_amount() {
        let (mut engine, customer) = engine();
        let result = engine.commit_receipt(&customer.id, extracted(0, "Z"), "", false);
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(engine.snapshot().records.is_empty());
    }

    #[test]
    fn test_commit_for_unknown_customer_fails_before_duplicate_check() {
        let (mut engine, customer) = engine();
        engine
            .commit_receipt(&customer.id, extracted(400_000, "A1"), "", false)
            .unwrap();

        let result = engine.commit_receipt("ghost", extracted(400_000, "A1"), "", false);
        assert!(matches!(result, Err(LedgerError::CustomerNotFound(_))));
        assert_eq!(engine.snapshot().records.len(), 1);
    }

    #[test]
    fn test_commit_attaches_matching_creditor() {
        let (mut engine, customer) = engine();
        let creditor = engine
            .upsert_creditor(Creditor::new(
                "Sarraf".to_string(),
                "6037-0001".to_string(),
                String::new(),
                BigDecimal::from(1_000),
            ))
            .unwrap();

        let mut data = extracted(500, "R9");
        data.receiver = "60370001".to_string();
        let CommitOutcome::Committed(record) =
            engine.commit_receipt(&customer.id, data, "", false).unwrap()
        else {
            panic!("expected a commit");
        };
        assert_eq!(record.matched_creditor_id, Some(creditor.id));
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let (mut engine, customer) = engine();

        let stale = engine.begin_scan(&customer.id, image()).unwrap();
        assert!(engine.cancel_scan());
        assert_eq!(engine.scan_state(), &ScanState::Idle);

        let response = stale.send().await;
        assert_eq!(engine.receive_extraction(response), ScanUpdate::Discarded);
        assert_eq!(engine.scan_state(), &ScanState::Idle);
    }

    #[tokio::test]
    async fn test_superseded_scan_response_is_discarded() {
        let (mut engine, customer) = engine();

        let first = engine.begin_scan(&customer.id, image()).unwrap();
        let second = engine.begin_scan(&customer.id, image()).unwrap();
        assert_ne!(first.ticket(), second.ticket());

        let late = first.send().await;
        assert_eq!(engine.receive_extraction(late), ScanUpdate::Discarded);
        assert_eq!(engine.scan_state(), &ScanState::Extracting);

        let current = second.send().await;
        assert!(matches!(
            engine.receive_extraction(current),
            ScanUpdate::Reviewing(_)
        ));
    }

    #[tokio::test]
    async fn test_scan_flow_commits() {
        let (mut engine, customer) = engine();

        let update = engine.scan_receipt(&customer.id, image()).await.unwrap();
        assert!(matches!(update, ScanUpdate::Reviewing(_)));

        let outcome = engine.confirm_scan(false).unwrap();
        let CommitOutcome::Committed(record) = outcome else {
            panic!("expected a commit");
        };
        assert_eq!(record.image_url, "blob:1");
        assert!(matches!(engine.scan_state(), ScanState::Committed { .. }));
        assert!(engine.confirm_scan(false).is_err());
    }

    #[tokio::test]
    async fn test_begin_scan_requires_image_and_customer() {
        let (mut engine, customer) = engine();

        let pdf = ReceiptImage::new(vec![1], "application/pdf");
        assert!(matches!(
            engine.begin_scan(&customer.id, pdf),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            engine.begin_scan("ghost", image()),
            Err(LedgerError::CustomerNotFound(_))
        ));
        assert_eq!(engine.scan_state(), &ScanState::Idle);
    }

    #[tokio::test]
    async fn test_creditor_scan_failure_is_surfaced() {
        let (engine, _) = engine();
        let result = engine.scan_creditor_info(&image()).await;
        assert!(matches!(
            result,
            Err(LedgerError::Extraction(ExtractionError::Unauthorized(_)))
        ));
        assert_eq!(engine.check_extraction_service().await.unwrap(), "ok");
    }

    #[test]
    fn test_creditor_from_scan_normalizes_sheba() {
        let creditor = creditor_from_scan(
            CreditorInfo {
                name: "Sarraf".to_string(),
                account: "0102".to_string(),
                sheba: "IR 12 3456".to_string(),
            },
            BigDecimal::from(100),
        );
        assert_eq!(creditor.sheba_number, "IR123456");
        assert_eq!(creditor.account_number, "0102");
    }

    #[test]
    fn test_removing_scanned_customer_closes_scan() {
        let (mut engine, customer) = engine();
        engine.begin_scan(&customer.id, image()).unwrap();

        engine.remove_customer(&customer.id).unwrap();
        assert!(engine.active_scan().is_none());
    }
}
