//! Receipt scan sessions and the extraction round trip
//!
//! A scan moves `Idle -> Extracting -> Reviewing | AwaitingOverride ->
//! Committed`, or `Extracting -> Failed -> Idle`. The extraction call is
//! detached from the engine as an [`ExtractionRequest`] so the caller can
//! cancel or restart the scan while it is in flight; the response carries
//! the [`ScanTicket`] it was issued under and is dropped if that ticket is
//! no longer the active one.

use std::sync::Arc;

use crate::traits::ExtractionService;
use crate::types::*;

/// Identifies one scan attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanTicket(pub(crate) u64);

/// Where the active scan currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    Idle,
    Extracting,
    /// Extraction succeeded and nothing similar is on file
    Reviewing { extracted: ExtractedData },
    /// Extraction succeeded but matches a stored record
    AwaitingOverride {
        extracted: ExtractedData,
        existing: ReceiptRecord,
    },
    Committed { record: ReceiptRecord },
    Failed { error: ExtractionError },
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Extracting => "extracting",
            ScanState::Reviewing { .. } => "reviewing",
            ScanState::AwaitingOverride { .. } => "awaiting_override",
            ScanState::Committed { .. } => "committed",
            ScanState::Failed { .. } => "failed",
        }
    }
}

pub(crate) static IDLE: ScanState = ScanState::Idle;

/// The scan dialog for one customer and one image
#[derive(Debug, Clone)]
pub struct ScanSession {
    ticket: ScanTicket,
    customer_id: String,
    image_reference: String,
    state: ScanState,
}

impl ScanSession {
    pub(crate) fn start(ticket: ScanTicket, customer_id: String, image_reference: String) -> Self {
        Self {
            ticket,
            customer_id,
            image_reference,
            state: ScanState::Extracting,
        }
    }

    pub fn ticket(&self) -> ScanTicket {
        self.ticket
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn image_reference(&self) -> &str {
        &self.image_reference
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: ScanState) {
        tracing::debug!(
            ticket = self.ticket.0,
            from = self.state.name(),
            to = state.name(),
            "Scan state changed"
        );
        self.state = state;
    }

    /// Whether a response for `ticket` should still be applied
    pub(crate) fn accepts(&self, ticket: ScanTicket) -> bool {
        self.ticket == ticket && self.state == ScanState::Extracting
    }
}

/// Outcome of feeding an extraction response back to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ScanUpdate {
    /// The response belonged to a cancelled or superseded scan
    Discarded,
    /// Ready for the user to confirm
    Reviewing(ExtractedData),
    /// Looks like a re-scan; needs an explicit override to commit
    DuplicateFound {
        candidate: ExtractedData,
        existing: ReceiptRecord,
    },
    /// The service failed; the user may retry
    Failed(ExtractionError),
}

/// A pending call to the extraction service, detached from the engine
pub struct ExtractionRequest<E: ExtractionService + ?Sized> {
    pub(crate) ticket: ScanTicket,
    pub(crate) image: ReceiptImage,
    pub(crate) known_creditors: Vec<Creditor>,
    pub(crate) extractor: Arc<E>,
}

impl<E: ExtractionService + ?Sized> ExtractionRequest<E> {
    pub fn ticket(&self) -> ScanTicket {
        self.ticket
    }

    pub fn image(&self) -> &ReceiptImage {
        &self.image
    }

    /// Call the extraction service
    pub async fn send(self) -> ExtractionResponse {
        let result = self
            .extractor
            .extract_receipt(&self.image, &self.known_creditors)
            .await;
        ExtractionResponse {
            ticket: self.ticket,
            result,
        }
    }
}

/// The service's answer, tagged with the ticket it was requested under
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResponse {
    pub ticket: ScanTicket,
    pub result: Result<ExtractedData, ExtractionError>,
}
