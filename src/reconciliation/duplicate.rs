//! Detection of receipts that were already recorded

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Why a candidate was considered a re-scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateReason {
    /// Same non-empty reference number
    RefNumber,
    /// Same amount, date and sender
    AmountDateSender,
}

/// Find a stored record the candidate duplicates.
///
/// A reference number match always wins over the coarser amount, date and
/// sender match, regardless of record order. The coarse match applies to
/// every record, so a misread reference number still gets caught.
pub fn detect_duplicate<'a>(
    candidate: &ExtractedData,
    existing: &'a [ReceiptRecord],
) -> Option<(&'a ReceiptRecord, DuplicateReason)> {
    let candidate_ref = candidate.ref_number.as_str();

    if !candidate_ref.is_empty() {
        if let Some(record) = existing
            .iter()
            .find(|r| !r.ref_number.is_empty() && r.ref_number == candidate_ref)
        {
            return Some((record, DuplicateReason::RefNumber));
        }
    }

    let date = candidate.date.trim();
    let sender = candidate.sender.trim();
    existing
        .iter()
        .find(|r| {
            r.amount == candidate.amount && r.date.trim() == date && r.sender.trim() == sender
        })
        .map(|r| (r, DuplicateReason::AmountDateSender))
}

/// Convenience wrapper returning only the matching record
pub fn find_duplicate<'a>(
    candidate: &ExtractedData,
    existing: &'a [ReceiptRecord],
) -> Option<&'a ReceiptRecord> {
    detect_duplicate(candidate, existing).map(|(record, _)| record)
}
