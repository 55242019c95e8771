//! Attribution of receipts to creditors for debt coverage reporting

use crate::types::*;
use crate::utils::validation::{normalize_account_number, normalize_sheba};

/// Receiving-side details read off a receipt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverDetails {
    pub account_number: String,
    pub name: String,
    pub sheba: String,
}

impl ReceiverDetails {
    /// Collect receiver details from extraction output.
    ///
    /// Explicit `account`/`sheba` dynamic fields are preferred; otherwise
    /// the free-text receiver is tried as both.
    pub fn from_extracted(extracted: &ExtractedData) -> Self {
        let field = |names: &[&str]| {
            extracted
                .dynamic_fields
                .iter()
                .find(|(key, value)| {
                    !value.trim().is_empty()
                        && names.iter().any(|n| key.eq_ignore_ascii_case(n))
                })
                .map(|(_, value)| value.clone())
        };

        Self {
            account_number: field(&["account", "accountNumber"])
                .unwrap_or_else(|| extracted.receiver.clone()),
            name: extracted.receiver.clone(),
            sheba: field(&["sheba", "shebaNumber", "iban"])
                .unwrap_or_else(|| extracted.receiver.clone()),
        }
    }
}

/// Propose the creditor a receipt was paid to.
///
/// Exact match on normalized account number first, then on normalized
/// sheba number. Ties go to the earliest-created creditor.
pub fn match_creditor<'a>(
    details: &ReceiverDetails,
    creditors: &'a [Creditor],
) -> Option<&'a Creditor> {
    let account = normalize_account_number(&details.account_number);
    if !account.is_empty() {
        let found = creditors
            .iter()
            .filter(|c| normalize_account_number(&c.account_number) == account)
            .min_by_key(|c| c.created_at);
        if found.is_some() {
            return found;
        }
    }

    let sheba = normalize_sheba(&details.sheba);
    if !sheba.is_empty() {
        return creditors
            .iter()
            .filter(|c| normalize_sheba(&c.sheba_number) == sheba)
            .min_by_key(|c| c.created_at);
    }

    None
}

/// Decide the `matched_creditor_id` to store with a receipt.
///
/// A service-proposed id is kept only if it names a live creditor;
/// otherwise the local matcher runs on the receiver details.
pub fn resolve_matched_creditor(
    extracted: &ExtractedData,
    creditors: &[Creditor],
) -> Option<String> {
    if let Some(proposed) = extracted.matched_creditor_id.as_deref() {
        if creditors.iter().any(|c| c.id == proposed) {
            return Some(proposed.to_string());
        }
        tracing::debug!(proposed, "Ignoring match to unknown creditor");
    }

    match_creditor(&ReceiverDetails::from_extracted(extracted), creditors).map(|c| c.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Duration;

    fn creditor(name: &str, account: &str, sheba: &str) -> Creditor {
        Creditor::new(
            name.to_string(),
            account.to_string(),
            sheba.to_string(),
            BigDecimal::from(1_000),
        )
    }

    #[test]
    fn test_account_number_match_ignores_separators() {
        let creditors = vec![creditor("A", "0102-3456-78", ""), creditor("B", "999", "")];
        let details = ReceiverDetails {
            account_number: "0102 3456 78".to_string(),
            ..Default::default()
        };

        assert_eq!(match_creditor(&details, &creditors).unwrap().name, "A");
    }

    #[test]
    fn test_sheba_fallback() {
        let creditors = vec![creditor("A", "111", "IR120000000000000000000042")];
        let details = ReceiverDetails {
            account_number: "222".to_string(),
            sheba: "ir12 0000 0000 0000 0000 0000 42".to_string(),
            ..Default::default()
        };

        assert_eq!(match_creditor(&details, &creditors).unwrap().name, "A");
    }

    #[test]
    fn test_no_match() {
        let creditors = vec![creditor("A", "111", "IR1")];
        let details = ReceiverDetails {
            account_number: "222".to_string(),
            sheba: "IR2".to_string(),
            ..Default::default()
        };
        assert!(match_creditor(&details, &creditors).is_none());
        assert!(match_creditor(&ReceiverDetails::default(), &creditors).is_none());
    }

    #[test]
    fn test_tie_prefers_earliest_created() {
        let mut newer = creditor("Newer", "555", "");
        let mut older = creditor("Older", "555", "");
        older.created_at = newer.created_at - Duration::days(3);
        newer.created_at += Duration::seconds(1);
        let creditors = vec![newer, older];

        let details = ReceiverDetails {
            account_number: "555".to_string(),
            ..Default::default()
        };
        assert_eq!(match_creditor(&details, &creditors).unwrap().name, "Older");
    }

    #[test]
    fn test_resolve_keeps_known_proposal_and_drops_unknown() {
        let creditors = vec![creditor("A", "111", "")];
        let mut extracted = ExtractedData {
            matched_creditor_id: Some(creditors[0].id.clone()),
            ..Default::default()
        };
        assert_eq!(
            resolve_matched_creditor(&extracted, &creditors),
            Some(creditors[0].id.clone())
        );

        extracted.matched_creditor_id = Some("gone".to_string());
        assert_eq!(resolve_matched_creditor(&extracted, &creditors), None);

        extracted.receiver = "111".to_string();
        assert_eq!(
            resolve_matched_creditor(&extracted, &creditors),
            Some(creditors[0].id.clone())
        );
    }

    #[test]
    fn test_details_prefer_dynamic_fields() {
        let mut extracted = ExtractedData {
            receiver: "Sarraf Co".to_string(),
            ..Default::default()
        };
        extracted
            .dynamic_fields
            .insert("Sheba".to_string(), "IR77".to_string());

        let details = ReceiverDetails::from_extracted(&extracted);
        assert_eq!(details.sheba, "IR77");
        assert_eq!(details.account_number, "Sarraf Co");
    }
}
